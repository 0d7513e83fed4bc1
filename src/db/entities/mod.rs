//! SeaORM Entity Crate
//!
//! Defines the SeaORM entities that map to database tables.
//! Every table carries a `deleted` soft-delete marker; reads filter on it.

pub mod container;
pub mod refresh_token;
pub mod server;
pub mod user;

pub mod prelude {
    pub use super::user::ActiveModel as UserActiveModel;
    pub use super::user::Column as UserColumn;
    pub use super::user::Entity as User;
    pub use super::user::Model as UserModel;

    pub use super::server::ActiveModel as ServerActiveModel;
    pub use super::server::Column as ServerColumn;
    pub use super::server::Entity as Server;
    pub use super::server::Model as ServerModel;

    pub use super::container::ActiveModel as ContainerActiveModel;
    pub use super::container::Column as ContainerColumn;
    pub use super::container::Entity as Container;
    pub use super::container::Model as ContainerModel;

    pub use super::refresh_token::ActiveModel as RefreshTokenActiveModel;
    pub use super::refresh_token::Column as RefreshTokenColumn;
    pub use super::refresh_token::Entity as RefreshToken;
    pub use super::refresh_token::Model as RefreshTokenModel;
}
