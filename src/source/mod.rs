//! Target-site access: sessions, authentication, and page extraction

mod auth;
mod gallery;
mod session;
mod traits;

pub use auth::LoginManager;
pub use gallery::GallerySource;
pub use session::{PageHandle, Session, SessionSlot};
pub use traits::PageSource;
