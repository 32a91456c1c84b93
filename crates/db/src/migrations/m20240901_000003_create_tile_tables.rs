//! Create custom_tile and tile_layout tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CustomTile::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CustomTile::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CustomTile::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(CustomTile::Name).string_len(32).not_null())
                    .col(ColumnDef::new(CustomTile::NameLower).string_len(32).not_null())
                    .col(ColumnDef::new(CustomTile::Color).string_len(7).not_null())
                    .col(ColumnDef::new(CustomTile::Icon).string_len(64))
                    .col(
                        ColumnDef::new(CustomTile::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_custom_tile_user")
                            .from(CustomTile::Table, CustomTile::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: tile names are unique per user, ignoring case
        manager
            .create_index(
                Index::create()
                    .name("idx_custom_tile_user_name_lower")
                    .table(CustomTile::Table)
                    .col(CustomTile::UserId)
                    .col(CustomTile::NameLower)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TileLayout::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TileLayout::UserId)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TileLayout::Entries)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(TileLayout::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tile_layout_user")
                            .from(TileLayout::Table, TileLayout::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TileLayout::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CustomTile::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CustomTile {
    Table,
    Id,
    UserId,
    Name,
    NameLower,
    Color,
    Icon,
    CreatedAt,
}

#[derive(Iden)]
enum TileLayout {
    Table,
    UserId,
    Entries,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
