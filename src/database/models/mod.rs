pub mod movie;
pub mod permission;
pub mod token;
pub mod user;

pub use movie::{Movie, MovieModel, Runtime, MOVIE_SORT_SAFELIST};
pub use permission::{PermissionModel, Permissions, MOVIES_READ, MOVIES_WRITE};
pub use token::{Token, TokenModel, TokenScope};
pub use user::{Password, PasswordError, User, UserModel};
