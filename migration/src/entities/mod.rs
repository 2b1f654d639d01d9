pub mod click_event;
pub mod customer;
pub mod dead_letter;
pub mod lead_event;
pub mod link;
pub mod link_tag;
pub mod partner;
pub mod payout;
pub mod program;
pub mod program_enrollment;
pub mod reward;
pub mod sale;
pub mod sale_event;
pub mod tag;
pub mod workspace;
pub mod workspace_token;

pub use click_event::Entity as ClickEventEntity;
pub use customer::Entity as CustomerEntity;
pub use dead_letter::Entity as DeadLetterEntity;
pub use lead_event::Entity as LeadEventEntity;
pub use link::Entity as LinkEntity;
pub use link_tag::Entity as LinkTagEntity;
pub use partner::Entity as PartnerEntity;
pub use payout::Entity as PayoutEntity;
pub use program::Entity as ProgramEntity;
pub use program_enrollment::Entity as ProgramEnrollmentEntity;
pub use reward::Entity as RewardEntity;
pub use sale::Entity as SaleEntity;
pub use sale_event::Entity as SaleEventEntity;
pub use tag::Entity as TagEntity;
pub use workspace::Entity as WorkspaceEntity;
pub use workspace_token::Entity as WorkspaceTokenEntity;
