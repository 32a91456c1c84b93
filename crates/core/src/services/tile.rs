//! Tile catalog, custom tiles and the per-user tile layout.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::Utc;
use habitgrid_common::{AppError, AppResult};
use habitgrid_db::{
    entities::{custom_tile, tile_layout},
    repositories::TileRepository,
};
use regex::Regex;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::{Uuid, Variant};
use validator::Validate;

/// Maximum number of custom tiles per user.
pub const MAX_CUSTOM_TILES: u64 = 50;

/// Maximum custom tile name length, in characters.
const MAX_TILE_NAME_CHARS: usize = 32;

static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color regex"));

/// A built-in tile.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PredefinedTile {
    pub key: &'static str,
    pub label: &'static str,
    pub color: &'static str,
}

const fn tile(key: &'static str, label: &'static str, color: &'static str) -> PredefinedTile {
    PredefinedTile { key, label, color }
}

/// The built-in tiles, in default layout order.
pub const CATALOG: [PredefinedTile; 12] = [
    tile("sleep", "Sleep", "#5B6C8F"),
    tile("work", "Work", "#3A7BD5"),
    tile("exercise", "Exercise", "#E4572E"),
    tile("study", "Study", "#7E57C2"),
    tile("reading", "Reading", "#8D6E63"),
    tile("family", "Family", "#F2A541"),
    tile("social", "Social", "#EC407A"),
    tile("chores", "Chores", "#78909C"),
    tile("commute", "Commute", "#26A69A"),
    tile("cooking", "Cooking", "#FF7043"),
    tile("meditation", "Meditation", "#9CCC65"),
    tile("entertainment", "Entertainment", "#AB47BC"),
];

/// Whether `key` names a built-in tile.
#[must_use]
pub fn is_predefined(key: &str) -> bool {
    CATALOG.iter().any(|t| t.key == key)
}

/// Parse a client-generated custom tile id.
///
/// Only the 36-character hyphenated form is accepted. The version must be
/// 1 through 8 with the RFC 4122 variant, which also rules out the nil and
/// max UUIDs. Returns the lowercase canonical form.
pub fn parse_custom_tile_id(id: &str) -> AppResult<String> {
    let invalid = || AppError::Validation(format!("invalid tile id {id:?}"));

    let bytes = id.as_bytes();
    let hyphens_ok = bytes.len() == 36
        && [8, 13, 18, 23].iter().all(|&i| bytes[i] == b'-');
    if !hyphens_ok {
        return Err(invalid());
    }

    let uuid = Uuid::try_parse(id).map_err(|_| invalid())?;
    if uuid.is_nil()
        || !(1..=8).contains(&uuid.get_version_num())
        || uuid.get_variant() != Variant::RFC4122
    {
        return Err(invalid());
    }

    Ok(uuid.hyphenated().to_string())
}

/// Display size of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileSize {
    Small,
    Medium,
    Large,
}

/// One slot of a layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEntry {
    pub tile_id: String,
    pub size: TileSize,
    #[serde(default)]
    pub hidden: bool,
}

impl LayoutEntry {
    fn visible(tile_id: impl Into<String>) -> Self {
        Self {
            tile_id: tile_id.into(),
            size: TileSize::Medium,
            hidden: false,
        }
    }
}

/// Layout used until a user changes anything.
#[must_use]
pub fn default_layout() -> Vec<LayoutEntry> {
    CATALOG.iter().map(|t| LayoutEntry::visible(t.key)).collect()
}

/// Move the entry at `from` so it ends up at index `to`.
pub fn move_entry(entries: &mut Vec<LayoutEntry>, from: usize, to: usize) -> AppResult<()> {
    let len = entries.len();
    if from >= len || to >= len {
        return Err(AppError::BadRequest(format!(
            "move {from} -> {to} out of range for {len} tiles"
        )));
    }
    let entry = entries.remove(from);
    entries.insert(to, entry);
    Ok(())
}

/// Check that a layout references each known tile at most once and nothing else.
pub fn validate_layout(entries: &[LayoutEntry], known: &HashSet<String>) -> AppResult<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !known.contains(&entry.tile_id) {
            return Err(AppError::Validation(format!(
                "unknown tile {:?}",
                entry.tile_id
            )));
        }
        if !seen.insert(entry.tile_id.as_str()) {
            return Err(AppError::Validation(format!(
                "tile {:?} appears twice",
                entry.tile_id
            )));
        }
    }
    Ok(())
}

/// Input for creating a custom tile.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomTileInput {
    pub id: String,
    pub name: String,
    #[validate(regex(path = *COLOR_RE))]
    pub color: String,
    #[validate(length(max = 64))]
    pub icon: Option<String>,
}

/// Input for updating a custom tile. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomTileInput {
    pub id: String,
    pub name: Option<String>,
    #[validate(regex(path = *COLOR_RE))]
    pub color: Option<String>,
    #[validate(length(max = 64))]
    pub icon: Option<String>,
}

fn normalize_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    let chars = trimmed.chars().count();
    if chars == 0 || chars > MAX_TILE_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "tile name must be 1 to {MAX_TILE_NAME_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Tile service for business logic.
#[derive(Clone)]
pub struct TileService {
    tile_repo: TileRepository,
}

impl TileService {
    /// Create a new tile service.
    #[must_use]
    pub const fn new(tile_repo: TileRepository) -> Self {
        Self { tile_repo }
    }

    /// The built-in tile catalog.
    #[must_use]
    pub const fn catalog(&self) -> &'static [PredefinedTile] {
        &CATALOG
    }

    /// Custom tiles of a user.
    pub async fn list_custom(&self, user_id: &str) -> AppResult<Vec<custom_tile::Model>> {
        self.tile_repo.find_custom_by_user(user_id).await
    }

    /// The stored form of `tile_id`, which must be a built-in key or one of
    /// the user's custom tiles.
    pub async fn resolve_tile_id(&self, user_id: &str, tile_id: &str) -> AppResult<String> {
        if is_predefined(tile_id) {
            return Ok(tile_id.to_string());
        }
        let Ok(id) = parse_custom_tile_id(tile_id) else {
            return Err(AppError::Validation(format!("unknown tile {tile_id:?}")));
        };
        match self.tile_repo.find_custom_by_id(&id).await? {
            Some(tile) if tile.user_id == user_id => Ok(id),
            _ => Err(AppError::Validation(format!("unknown tile {tile_id:?}"))),
        }
    }

    /// Create a custom tile and append it to the layout.
    pub async fn create_custom(
        &self,
        user_id: &str,
        input: CreateCustomTileInput,
    ) -> AppResult<custom_tile::Model> {
        input.validate()?;
        let id = parse_custom_tile_id(&input.id)?;
        let name = normalize_name(&input.name)?;
        let name_lower = name.to_lowercase();

        if self.tile_repo.count_custom_by_user(user_id).await? >= MAX_CUSTOM_TILES {
            return Err(AppError::BadRequest(format!(
                "at most {MAX_CUSTOM_TILES} custom tiles allowed"
            )));
        }
        if self
            .tile_repo
            .find_custom_by_name(user_id, &name_lower)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!("tile {name:?} already exists")));
        }
        if self.tile_repo.find_custom_by_id(&id).await?.is_some() {
            return Err(AppError::Conflict("tile id already in use".to_string()));
        }

        let tile = self
            .tile_repo
            .create_custom(custom_tile::ActiveModel {
                id: Set(id),
                user_id: Set(user_id.to_string()),
                name: Set(name),
                name_lower: Set(name_lower),
                color: Set(input.color),
                icon: Set(input.icon),
                created_at: Set(Utc::now().fixed_offset()),
            })
            .await?;

        let mut layout = self.get_layout(user_id).await?;
        layout.push(LayoutEntry::visible(tile.id.clone()));
        self.store_layout(user_id, &layout).await?;

        tracing::debug!(user_id = %user_id, tile_id = %tile.id, "Custom tile created");
        Ok(tile)
    }

    /// Rename or restyle a custom tile.
    pub async fn update_custom(
        &self,
        user_id: &str,
        input: UpdateCustomTileInput,
    ) -> AppResult<custom_tile::Model> {
        input.validate()?;
        let tile = self.get_owned(user_id, &input.id).await?;
        let mut active: custom_tile::ActiveModel = tile.clone().into();

        if let Some(ref name) = input.name {
            let name = normalize_name(name)?;
            let name_lower = name.to_lowercase();
            if name_lower != tile.name_lower {
                if self
                    .tile_repo
                    .find_custom_by_name(user_id, &name_lower)
                    .await?
                    .is_some()
                {
                    return Err(AppError::Conflict(format!("tile {name:?} already exists")));
                }
                active.name_lower = Set(name_lower);
            }
            active.name = Set(name);
        }
        if let Some(color) = input.color {
            active.color = Set(color);
        }
        if let Some(icon) = input.icon {
            active.icon = Set((!icon.is_empty()).then_some(icon));
        }

        self.tile_repo.update_custom(active).await
    }

    /// Delete a custom tile and drop it from the layout.
    pub async fn delete_custom(&self, user_id: &str, tile_id: &str) -> AppResult<()> {
        let tile = self.get_owned(user_id, tile_id).await?;
        let id = tile.id.clone();
        self.tile_repo.delete_custom(tile).await?;

        if let Some(mut layout) = self.stored_layout(user_id).await? {
            let before = layout.len();
            layout.retain(|e| e.tile_id != id);
            if layout.len() != before {
                self.store_layout(user_id, &layout).await?;
            }
        }
        Ok(())
    }

    /// Current layout, or the default one.
    pub async fn get_layout(&self, user_id: &str) -> AppResult<Vec<LayoutEntry>> {
        Ok(self
            .stored_layout(user_id)
            .await?
            .unwrap_or_else(default_layout))
    }

    /// Replace the whole layout.
    pub async fn replace_layout(
        &self,
        user_id: &str,
        entries: Vec<LayoutEntry>,
    ) -> AppResult<Vec<LayoutEntry>> {
        let mut known: HashSet<String> = CATALOG.iter().map(|t| t.key.to_string()).collect();
        known.extend(
            self.tile_repo
                .find_custom_by_user(user_id)
                .await?
                .into_iter()
                .map(|t| t.id),
        );
        validate_layout(&entries, &known)?;

        self.store_layout(user_id, &entries).await?;
        Ok(entries)
    }

    /// Drag-and-drop reorder.
    pub async fn move_tile(
        &self,
        user_id: &str,
        from: usize,
        to: usize,
    ) -> AppResult<Vec<LayoutEntry>> {
        let mut layout = self.get_layout(user_id).await?;
        move_entry(&mut layout, from, to)?;
        self.store_layout(user_id, &layout).await?;
        Ok(layout)
    }

    /// Change the size of one tile.
    pub async fn resize_tile(
        &self,
        user_id: &str,
        tile_id: &str,
        size: TileSize,
    ) -> AppResult<Vec<LayoutEntry>> {
        self.edit_entry(user_id, tile_id, |e| e.size = size).await
    }

    /// Hide or show one tile.
    pub async fn set_visibility(
        &self,
        user_id: &str,
        tile_id: &str,
        hidden: bool,
    ) -> AppResult<Vec<LayoutEntry>> {
        self.edit_entry(user_id, tile_id, |e| e.hidden = hidden).await
    }

    async fn edit_entry(
        &self,
        user_id: &str,
        tile_id: &str,
        edit: impl FnOnce(&mut LayoutEntry),
    ) -> AppResult<Vec<LayoutEntry>> {
        let mut layout = self.get_layout(user_id).await?;
        let entry = layout
            .iter_mut()
            .find(|e| e.tile_id == tile_id)
            .ok_or_else(|| AppError::NotFound(format!("tile {tile_id:?} is not in the layout")))?;
        edit(entry);
        self.store_layout(user_id, &layout).await?;
        Ok(layout)
    }

    async fn get_owned(&self, user_id: &str, tile_id: &str) -> AppResult<custom_tile::Model> {
        let id = parse_custom_tile_id(tile_id)?;
        self.tile_repo
            .find_custom_by_id(&id)
            .await?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Tile not found".to_string()))
    }

    async fn stored_layout(&self, user_id: &str) -> AppResult<Option<Vec<LayoutEntry>>> {
        self.tile_repo
            .find_layout(user_id)
            .await?
            .map(|row| {
                serde_json::from_value(row.entries)
                    .map_err(|e| AppError::Internal(format!("Corrupt tile layout: {e}")))
            })
            .transpose()
    }

    async fn store_layout(&self, user_id: &str, entries: &[LayoutEntry]) -> AppResult<()> {
        let json = serde_json::to_value(entries)
            .map_err(|e| AppError::Internal(format!("Failed to encode layout: {e}")))?;
        self.tile_repo
            .upsert_layout(tile_layout::ActiveModel {
                user_id: Set(user_id.to_string()),
                entries: Set(json),
                updated_at: Set(Utc::now().fixed_offset()),
            })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: MockDatabase) -> TileService {
        TileService::new(TileRepository::new(Arc::new(db.into_connection())))
    }

    fn custom(id: &str, user_id: &str, name: &str) -> custom_tile::Model {
        custom_tile::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            name_lower: name.to_lowercase(),
            color: "#112233".to_string(),
            icon: None,
            created_at: Utc::now().into(),
        }
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    const V4: &str = "0b6f3c1e-6a2d-4f7b-9c1e-2d3f4a5b6c7d";
    const V7: &str = "01890a5d-ac96-774b-bcce-b302099a8057";

    #[test]
    fn test_custom_tile_id_accepts_v4_and_v7() {
        assert_eq!(parse_custom_tile_id(V4).unwrap(), V4);
        assert_eq!(parse_custom_tile_id(V7).unwrap(), V7);
        assert_eq!(
            parse_custom_tile_id(&V4.to_uppercase()).unwrap(),
            V4,
            "uppercase input is canonicalised"
        );
    }

    #[test]
    fn test_custom_tile_id_rejects_bad_ids() {
        for id in [
            "",
            "not-a-uuid",
            "00000000-0000-0000-0000-000000000000",
            "ffffffff-ffff-ffff-ffff-ffffffffffff",
            // simple form
            "0b6f3c1e6a2d4f7b9c1e2d3f4a5b6c7d",
            // braced form
            "{0b6f3c1e-6a2d-4f7b-9c1e-2d3f4a5b6c7d}",
            // version 0
            "0b6f3c1e-6a2d-0f7b-9c1e-2d3f4a5b6c7d",
            // NCS variant
            "0b6f3c1e-6a2d-4f7b-1c1e-2d3f4a5b6c7d",
            // hyphens in the wrong places
            "0b6f3c1e6-a2d-4f7b-9c1e-2d3f4a5b6c7d",
        ] {
            assert!(parse_custom_tile_id(id).is_err(), "{id} should be rejected");
        }
    }

    #[test]
    fn test_default_layout_is_catalog() {
        let layout = default_layout();
        assert_eq!(layout.len(), CATALOG.len());
        assert!(layout.iter().all(|e| e.size == TileSize::Medium && !e.hidden));
        assert_eq!(layout[0].tile_id, "sleep");
    }

    #[test]
    fn test_move_entry_preserves_tiles() {
        let mut layout = default_layout();
        let mut before: Vec<_> = layout.iter().map(|e| e.tile_id.clone()).collect();

        move_entry(&mut layout, 0, 5).unwrap();
        assert_eq!(layout[5].tile_id, "sleep");
        assert_eq!(layout[0].tile_id, "work");

        move_entry(&mut layout, 11, 0).unwrap();
        assert_eq!(layout[0].tile_id, "entertainment");

        let mut after: Vec<_> = layout.iter().map(|e| e.tile_id.clone()).collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn test_move_entry_same_index_is_noop() {
        let mut layout = default_layout();
        move_entry(&mut layout, 3, 3).unwrap();
        assert_eq!(layout, default_layout());
    }

    #[test]
    fn test_move_entry_rejects_out_of_range() {
        let mut layout = default_layout();
        assert!(move_entry(&mut layout, 12, 0).is_err());
        assert!(move_entry(&mut layout, 0, 12).is_err());
        assert_eq!(layout, default_layout());
    }

    #[test]
    fn test_validate_layout() {
        let known: HashSet<String> = ["sleep", "work"].iter().map(ToString::to_string).collect();

        let ok = vec![LayoutEntry::visible("work"), LayoutEntry::visible("sleep")];
        assert!(validate_layout(&ok, &known).is_ok());

        let dup = vec![LayoutEntry::visible("work"), LayoutEntry::visible("work")];
        assert!(validate_layout(&dup, &known).is_err());

        let unknown = vec![LayoutEntry::visible("gaming")];
        assert!(validate_layout(&unknown, &known).is_err());
    }

    #[test]
    fn test_create_input_color_validation() {
        let input = CreateCustomTileInput {
            id: V4.to_string(),
            name: "Guitar".to_string(),
            color: "red".to_string(),
            icon: None,
        };
        assert!(input.validate().is_err());
    }

    #[tokio::test]
    async fn test_get_layout_defaults_when_missing() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<tile_layout::Model>::new()]),
        );
        assert_eq!(service.get_layout("u1").await.unwrap(), default_layout());
    }

    #[tokio::test]
    async fn test_create_custom_rejects_over_limit() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results(
            [[maplit::btreemap! {
                "num_items" => sea_orm::Value::BigInt(Some(50)),
            }]],
        ));
        let result = service
            .create_custom(
                "u1",
                CreateCustomTileInput {
                    id: V4.to_string(),
                    name: "Guitar".to_string(),
                    color: "#AA00FF".to_string(),
                    icon: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_custom_duplicate_name_case_insensitive() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(1)),
                }]])
                .append_query_results([[custom(V7, "u1", "guitar")]]),
        );
        let result = service
            .create_custom(
                "u1",
                CreateCustomTileInput {
                    id: V4.to_string(),
                    name: "  Guitar ".to_string(),
                    color: "#AA00FF".to_string(),
                    icon: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_custom_appends_to_layout() {
        let created = custom(V4, "u1", "Guitar");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(0)),
                }]])
                .append_query_results([Vec::<custom_tile::Model>::new()])
                .append_query_results([Vec::<custom_tile::Model>::new()])
                .append_query_results([[created.clone()]])
                .append_query_results([Vec::<tile_layout::Model>::new()])
                .append_exec_results([exec_ok()]),
        );
        let tile = service
            .create_custom(
                "u1",
                CreateCustomTileInput {
                    id: V4.to_string(),
                    name: "Guitar".to_string(),
                    color: "#AA00FF".to_string(),
                    icon: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(tile.id, V4);
    }

    #[tokio::test]
    async fn test_delete_custom_not_owned() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[custom(V4, "someone-else", "Guitar")]]),
        );
        let result = service.delete_custom("u1", V4).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resize_unknown_tile() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<tile_layout::Model>::new()]),
        );
        let result = service.resize_tile("u1", "gaming", TileSize::Large).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_visibility_stores_layout() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<tile_layout::Model>::new()])
                .append_exec_results([exec_ok()]),
        );
        let layout = service.set_visibility("u1", "work", true).await.unwrap();
        assert!(layout.iter().find(|e| e.tile_id == "work").unwrap().hidden);
    }

    #[tokio::test]
    async fn test_resolve_tile_id() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[custom(V4, "u2", "Guitar")]]),
        );
        assert_eq!(service.resolve_tile_id("u1", "sleep").await.unwrap(), "sleep");
        assert!(service.resolve_tile_id("u1", "nonsense").await.is_err());
        assert!(service.resolve_tile_id("u1", V4).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_tile_id_returns_lowercase_uuid() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[custom(V4, "u1", "Guitar")]]),
        );
        let resolved = service
            .resolve_tile_id("u1", &V4.to_uppercase())
            .await
            .unwrap();
        assert_eq!(resolved, V4);
    }
}
