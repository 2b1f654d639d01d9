pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20260301_000001_core_tables;
mod m20260301_000002_partner_programs;
mod m20260301_000003_event_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_core_tables::Migration),
            Box::new(m20260301_000002_partner_programs::Migration),
            Box::new(m20260301_000003_event_tables::Migration),
        ]
    }
}
