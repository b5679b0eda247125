// Google API clients - OAuth, YouTube enumeration, Drive mirroring

pub mod auth;
pub mod drive;
pub mod errors;
pub mod pagination;
pub mod youtube;

pub use auth::{Authenticator, ClientSecrets, StaticToken, TokenProvider};
pub use drive::DriveClient;
pub use errors::ApiError;
pub use youtube::YouTubeClient;
