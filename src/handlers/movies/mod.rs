// handlers/movies/mod.rs - movie catalog handlers
//
// Every route here sits behind a permission gate.

pub mod create; // POST   /v1/movies
pub mod delete; // DELETE /v1/movies/:id
pub mod list;   // GET    /v1/movies
pub mod show;   // GET    /v1/movies/:id
pub mod update; // PATCH  /v1/movies/:id

pub use create::movie_create;
pub use delete::movie_delete;
pub use list::movie_list;
pub use show::movie_show;
pub use update::movie_update;
