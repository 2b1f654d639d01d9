pub mod health;
pub mod redirect;
pub mod share;
pub mod track;

pub use health::{AppStartTime, HealthService, health_routes};
pub use redirect::{RedirectService, redirect_routes};
pub use share::{ShareService, share_routes};
pub use track::{TrackService, track_routes};
