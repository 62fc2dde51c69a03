//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for TripSync:
//!
//! - `users`: authentication
//! - `trips`: trips owned by users
//! - `trip_members`: member slots, optionally linked to a user
//! - `trip_links`: share link of each trip
//! - `trip_docs`: revisioned JSON document of each trip
//! - `itinerary_items`: timed or all-day plan entries
//! - `expenses`: payments split among members
//! - `settlements`: payments between two members
//! - `ai_proposals`: pending assistant edits keyed by nonce

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
}

#[derive(Iden)]
enum Trips {
    Table,
    Id,
    Name,
    Description,
    OwnerId,
    CreatedAt,
}

#[derive(Iden)]
enum TripMembers {
    Table,
    Id,
    TripId,
    DisplayName,
    UserId,
    Position,
}

#[derive(Iden)]
enum TripLinks {
    Table,
    TripId,
    Token,
    ExpiresAt,
    Revoked,
    CreatedAt,
}

#[derive(Iden)]
enum TripDocs {
    Table,
    TripId,
    Body,
    Revision,
    UpdatedAt,
}

#[derive(Iden)]
enum ItineraryItems {
    Table,
    Id,
    TripId,
    Title,
    ItemType,
    AllDay,
    StartTime,
    EndTime,
    Location,
    Notes,
    DayIndex,
    Lat,
    Lng,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    TripId,
    Description,
    Amount,
    PaidByMemberId,
    SplitWith,
    Category,
    CreatedAt,
}

#[derive(Iden)]
enum Settlements {
    Table,
    Id,
    TripId,
    PayerMemberId,
    PayeeMemberId,
    Amount,
    Mode,
    Note,
    CreatedAt,
}

#[derive(Iden)]
enum AiProposals {
    Table,
    Nonce,
    TripId,
    TripDocPatch,
    ItineraryOps,
    Status,
    CreatedAt,
    ExpiresAt,
}

fn trip_fk<T, C>(name: &str, table: T, col: C) -> ForeignKeyCreateStatement
where
    T: IntoIden + 'static,
    C: IntoIden + 'static,
{
    ForeignKey::create()
        .name(name)
        .from(table, col)
        .to(Trips::Table, Trips::Id)
        .on_delete(ForeignKeyAction::Cascade)
        .to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Trips
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Trips::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Trips::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Trips::Name).string().not_null())
                    .col(ColumnDef::new(Trips::Description).string())
                    .col(ColumnDef::new(Trips::OwnerId).string().not_null())
                    .col(ColumnDef::new(Trips::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-trips-owner_id")
                    .table(Trips::Table)
                    .col(Trips::OwnerId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Members
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(TripMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TripMembers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TripMembers::TripId).string().not_null())
                    .col(ColumnDef::new(TripMembers::DisplayName).string().not_null())
                    .col(ColumnDef::new(TripMembers::UserId).string())
                    .col(ColumnDef::new(TripMembers::Position).integer().not_null())
                    .foreign_key(&mut trip_fk(
                        "fk-trip_members-trip_id",
                        TripMembers::Table,
                        TripMembers::TripId,
                    ))
                    .to_owned(),
            )
            .await?;

        // One slot per account and trip.
        manager
            .create_index(
                Index::create()
                    .name("idx-trip_members-trip_id-user_id-unique")
                    .table(TripMembers::Table)
                    .col(TripMembers::TripId)
                    .col(TripMembers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Share links
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(TripLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TripLinks::TripId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TripLinks::Token)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(TripLinks::ExpiresAt).timestamp())
                    .col(
                        ColumnDef::new(TripLinks::Revoked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(TripLinks::CreatedAt).timestamp().not_null())
                    .foreign_key(&mut trip_fk(
                        "fk-trip_links-trip_id",
                        TripLinks::Table,
                        TripLinks::TripId,
                    ))
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Trip documents
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(TripDocs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TripDocs::TripId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TripDocs::Body).json().not_null())
                    .col(ColumnDef::new(TripDocs::Revision).big_integer().not_null())
                    .col(ColumnDef::new(TripDocs::UpdatedAt).timestamp().not_null())
                    .foreign_key(&mut trip_fk(
                        "fk-trip_docs-trip_id",
                        TripDocs::Table,
                        TripDocs::TripId,
                    ))
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Itinerary
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ItineraryItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ItineraryItems::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ItineraryItems::TripId).string().not_null())
                    .col(ColumnDef::new(ItineraryItems::Title).string().not_null())
                    .col(ColumnDef::new(ItineraryItems::ItemType).string().not_null())
                    .col(ColumnDef::new(ItineraryItems::AllDay).boolean().not_null())
                    .col(
                        ColumnDef::new(ItineraryItems::StartTime)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ItineraryItems::EndTime).timestamp())
                    .col(ColumnDef::new(ItineraryItems::Location).string())
                    .col(ColumnDef::new(ItineraryItems::Notes).string())
                    .col(ColumnDef::new(ItineraryItems::DayIndex).integer())
                    .col(ColumnDef::new(ItineraryItems::Lat).double())
                    .col(ColumnDef::new(ItineraryItems::Lng).double())
                    .foreign_key(&mut trip_fk(
                        "fk-itinerary_items-trip_id",
                        ItineraryItems::Table,
                        ItineraryItems::TripId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-itinerary_items-trip_id-start_time")
                    .table(ItineraryItems::Table)
                    .col(ItineraryItems::TripId)
                    .col(ItineraryItems::StartTime)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Expenses::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Expenses::TripId).string().not_null())
                    .col(ColumnDef::new(Expenses::Description).string().not_null())
                    .col(ColumnDef::new(Expenses::Amount).double().not_null())
                    .col(ColumnDef::new(Expenses::PaidByMemberId).string().not_null())
                    .col(ColumnDef::new(Expenses::SplitWith).json().not_null())
                    .col(ColumnDef::new(Expenses::Category).string())
                    .col(ColumnDef::new(Expenses::CreatedAt).timestamp().not_null())
                    .foreign_key(&mut trip_fk(
                        "fk-expenses-trip_id",
                        Expenses::Table,
                        Expenses::TripId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-trip_id")
                    .table(Expenses::Table)
                    .col(Expenses::TripId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Settlements
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Settlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Settlements::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Settlements::TripId).string().not_null())
                    .col(
                        ColumnDef::new(Settlements::PayerMemberId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Settlements::PayeeMemberId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::Amount).double().not_null())
                    .col(ColumnDef::new(Settlements::Mode).string().not_null())
                    .col(ColumnDef::new(Settlements::Note).string())
                    .col(
                        ColumnDef::new(Settlements::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(&mut trip_fk(
                        "fk-settlements-trip_id",
                        Settlements::Table,
                        Settlements::TripId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-settlements-trip_id")
                    .table(Settlements::Table)
                    .col(Settlements::TripId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 9. AI proposals
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(AiProposals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AiProposals::Nonce)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AiProposals::TripId).string().not_null())
                    .col(ColumnDef::new(AiProposals::TripDocPatch).json().not_null())
                    .col(ColumnDef::new(AiProposals::ItineraryOps).json().not_null())
                    .col(ColumnDef::new(AiProposals::Status).string().not_null())
                    .col(
                        ColumnDef::new(AiProposals::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AiProposals::ExpiresAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(&mut trip_fk(
                        "fk-ai_proposals-trip_id",
                        AiProposals::Table,
                        AiProposals::TripId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ai_proposals-expires_at")
                    .table(AiProposals::Table)
                    .col(AiProposals::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AiProposals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Settlements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ItineraryItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TripDocs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TripLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TripMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Trips::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}
