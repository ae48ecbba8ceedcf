mod controller;
mod view;

pub use controller::{SendOutcome, SessionController};
pub use view::{ChatView, NullView, RenderedMessage};
