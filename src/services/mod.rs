//! Service layer for business logic
//!
//! Shared between the HTTP handlers and the CLI.

pub mod click_tracker;
pub mod commission;
pub mod conversion;
pub mod link_service;
pub mod partner;
pub mod payout;
pub mod rate_limit;
pub mod resolver;

pub use click_tracker::{ClickOutcome, ClickTracker};
pub use commission::{calculate_earnings, select_reward};
pub use conversion::{ConversionService, TrackLeadRequest, TrackSaleRequest};
pub use link_service::LinkService;
pub use partner::PartnerService;
pub use payout::PayoutService;
pub use rate_limit::{CallerClass, ClickRateLimiter};
pub use resolver::{LinkResolver, RedirectTarget, ResolvedLink};
