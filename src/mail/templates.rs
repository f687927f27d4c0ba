/// Rendered message parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub plain: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    UserWelcome { user_id: i64, activation_token: String },
    TokenActivation { activation_token: String },
    TokenPasswordReset { password_reset_token: String },
}

impl Template {
    pub fn name(&self) -> &'static str {
        match self {
            Template::UserWelcome { .. } => "user_welcome",
            Template::TokenActivation { .. } => "token_activation",
            Template::TokenPasswordReset { .. } => "token_password_reset",
        }
    }

    pub fn render(&self) -> Email {
        match self {
            Template::UserWelcome {
                user_id,
                activation_token,
            } => Email {
                subject: "Welcome to Cinevault!".to_string(),
                plain: format!(
                    "Hi,\n\n\
                     Thanks for signing up for a Cinevault account. We're excited to have you on board!\n\n\
                     For future reference, your user ID number is {user_id}.\n\n\
                     Please send a request to the `PUT /v1/users/activated` endpoint with the following \
                     JSON body to activate your account:\n\n\
                     {{\"token\": \"{activation_token}\"}}\n\n\
                     Please note that this is a one-time use token and it will expire in 3 days.\n\n\
                     Thanks,\n\nThe Cinevault Team\n"
                ),
                html: html_page(&format!(
                    "<p>Hi,</p>\
                     <p>Thanks for signing up for a Cinevault account. We're excited to have you on board!</p>\
                     <p>For future reference, your user ID number is {user_id}.</p>\
                     <p>Please send a request to the <code>PUT /v1/users/activated</code> endpoint with the \
                     following JSON body to activate your account:</p>\
                     <pre><code>{{\"token\": \"{activation_token}\"}}</code></pre>\
                     <p>Please note that this is a one-time use token and it will expire in 3 days.</p>\
                     <p>Thanks,</p><p>The Cinevault Team</p>"
                )),
            },
            Template::TokenActivation { activation_token } => Email {
                subject: "Activate your Cinevault account".to_string(),
                plain: format!(
                    "Hi,\n\n\
                     Please send a `PUT /v1/users/activated` request with the following JSON body to \
                     activate your account:\n\n\
                     {{\"token\": \"{activation_token}\"}}\n\n\
                     Please note that this is a one-time use token and it will expire in 3 days.\n\n\
                     Thanks,\n\nThe Cinevault Team\n"
                ),
                html: html_page(&format!(
                    "<p>Hi,</p>\
                     <p>Please send a <code>PUT /v1/users/activated</code> request with the following JSON \
                     body to activate your account:</p>\
                     <pre><code>{{\"token\": \"{activation_token}\"}}</code></pre>\
                     <p>Please note that this is a one-time use token and it will expire in 3 days.</p>\
                     <p>Thanks,</p><p>The Cinevault Team</p>"
                )),
            },
            Template::TokenPasswordReset {
                password_reset_token,
            } => Email {
                subject: "Reset your Cinevault password".to_string(),
                plain: format!(
                    "Hi,\n\n\
                     Please send a `PUT /v1/users/password` request with the following JSON body to set \
                     a new password:\n\n\
                     {{\"password\": \"your new password\", \"token\": \"{password_reset_token}\"}}\n\n\
                     Please note that this is a one-time use token and it will expire in 45 minutes. If \
                     you need another token please make a `POST /v1/tokens/password-reset` request.\n\n\
                     Thanks,\n\nThe Cinevault Team\n"
                ),
                html: html_page(&format!(
                    "<p>Hi,</p>\
                     <p>Please send a <code>PUT /v1/users/password</code> request with the following JSON \
                     body to set a new password:</p>\
                     <pre><code>{{\"password\": \"your new password\", \"token\": \"{password_reset_token}\"}}</code></pre>\
                     <p>Please note that this is a one-time use token and it will expire in 45 minutes. \
                     If you need another token please make a <code>POST /v1/tokens/password-reset</code> \
                     request.</p>\
                     <p>Thanks,</p><p>The Cinevault Team</p>"
                )),
            },
        }
    }
}

fn html_page(body: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head>\n\
         <meta name=\"viewport\" content=\"width=device-width\" />\n\
         <meta http-equiv=\"Content-Type\" content=\"text/html; charset=UTF-8\" />\n\
         </head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}
