//! Local store mapping tags (guild roles) to catalog items.

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::{fmt::Display, path::Path};

/// Role id of a tag.
pub type TagId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemType {
    Game,
    Platform,
}

impl ItemType {
    pub const ALL: [ItemType; 2] = [ItemType::Game, ItemType::Platform];

    pub fn name(&self) -> &'static str {
        match self {
            ItemType::Game => "game",
            ItemType::Platform => "platform",
        }
    }

    /// Preposition used in "X now plays ..." sentences.
    pub fn pre(&self) -> &'static str {
        match self {
            ItemType::Game => "",
            ItemType::Platform => "on ",
        }
    }

    fn items_table(&self) -> &'static str {
        match self {
            ItemType::Game => "games",
            ItemType::Platform => "platforms",
        }
    }

    fn tags_table(&self) -> &'static str {
        match self {
            ItemType::Game => "game_tags",
            ItemType::Platform => "platform_tags",
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            ItemType::Game => "game_id",
            ItemType::Platform => "platform_id",
        }
    }
}

impl Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A game or platform imported from the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemType,
    pub id: u64,
    pub name: String,
    /// Only known for catalog search results.
    pub slug: Option<String>,
}

impl Item {
    pub fn new(kind: ItemType, id: u64, name: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            name: name.into(),
            slug: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemTag {
    pub item: Item,
    /// `None` for imported items which lost or never had a tag.
    pub tag: Option<TagId>,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY,
        description TEXT
    )",
    "CREATE TABLE IF NOT EXISTS games (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS platforms (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS game_tags (
        tag_id INTEGER,
        game_id INTEGER NOT NULL UNIQUE,
        PRIMARY KEY (tag_id),
        FOREIGN KEY (tag_id) REFERENCES tags(id),
        FOREIGN KEY (game_id) REFERENCES games(id)
    )",
    "CREATE TABLE IF NOT EXISTS platform_tags (
        tag_id INTEGER,
        platform_id INTEGER NOT NULL UNIQUE,
        PRIMARY KEY (tag_id),
        FOREIGN KEY (tag_id) REFERENCES tags(id),
        FOREIGN KEY (platform_id) REFERENCES platforms(id)
    )",
];

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

// Discord snowflakes fit into 63 bits, so the casts below are lossless.
fn to_sql(id: u64) -> i64 {
    id as i64
}

fn from_sql(id: i64) -> u64 {
    id as u64
}

impl Repository {
    /// Opens (and creates if needed) the database file.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        Self::setup(pool).await
    }

    /// Fresh database living in memory only.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let options = "sqlite::memory:"
            .parse::<SqliteConnectOptions>()?
            .foreign_keys(true);
        // Every connection to `:memory:` would see its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::setup(pool).await
    }

    async fn setup(pool: SqlitePool) -> Result<Self> {
        let mut tx = pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        tx.commit().await.context("Failed to create schema")?;

        Ok(Self { pool })
    }

    /// Returns false if the item was imported already.
    pub async fn add_item(&self, item: &Item) -> Result<bool> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} (id, name) VALUES (?, ?)",
            item.kind.items_table()
        );
        let result = sqlx::query(&sql)
            .bind(to_sql(item.id))
            .bind(&item.name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Associates the tag with the item, replacing previous associations of either.
    pub async fn add_item_tag(&self, item: &Item, tag: TagId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO tags (id) VALUES (?)")
            .bind(to_sql(tag))
            .execute(&mut *tx)
            .await?;
        // A tag belongs to a single item across both item types.
        for kind in ItemType::ALL {
            let sql = format!("DELETE FROM {} WHERE tag_id = ?", kind.tags_table());
            sqlx::query(&sql).bind(to_sql(tag)).execute(&mut *tx).await?;
        }
        let sql = format!(
            "REPLACE INTO {} (tag_id, {}) VALUES (?, ?)",
            item.kind.tags_table(),
            item.kind.id_column()
        );
        sqlx::query(&sql)
            .bind(to_sql(tag))
            .bind(to_sql(item.id))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn find_item_by_tag(&self, kind: ItemType, tag: TagId) -> Result<Option<Item>> {
        let sql = format!(
            "SELECT items.id, items.name
            FROM {items} AS items
            INNER JOIN {tags} AS links ON items.id = links.{id}
            WHERE links.tag_id = ?",
            items = kind.items_table(),
            tags = kind.tags_table(),
            id = kind.id_column(),
        );
        let row: Option<(i64, String)> = sqlx::query_as(&sql)
            .bind(to_sql(tag))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id, name)| Item::new(kind, from_sql(id), name)))
    }

    /// Looks through games first, then platforms.
    pub async fn find_any_item_by_tag(&self, tag: TagId) -> Result<Option<Item>> {
        for kind in ItemType::ALL {
            if let Some(item) = self.find_item_by_tag(kind, tag).await? {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// Items of the given type tagged by any of `tags`, sorted by item name.
    pub async fn find_item_tags_by_tags(
        &self,
        kind: ItemType,
        tags: &[TagId],
    ) -> Result<Vec<ItemTag>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; tags.len()].join(", ");
        let sql = format!(
            "SELECT links.tag_id, items.id, items.name
            FROM {items} AS items
            INNER JOIN {tags} AS links ON items.id = links.{id}
            WHERE links.tag_id IN ({placeholders})
            ORDER BY items.name ASC",
            items = kind.items_table(),
            tags = kind.tags_table(),
            id = kind.id_column(),
            placeholders = placeholders,
        );
        let mut query = sqlx::query_as::<_, (Option<i64>, i64, String)>(&sql);
        for tag in tags {
            query = query.bind(to_sql(*tag));
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(Self::item_tags(kind, rows))
    }

    /// Every imported item of the given type, with its tag if it has one.
    pub async fn find_all_items(&self, kind: ItemType) -> Result<Vec<ItemTag>> {
        let sql = format!(
            "SELECT links.tag_id, items.id, items.name
            FROM {items} AS items
            LEFT OUTER JOIN {tags} AS links ON items.id = links.{id}
            ORDER BY items.name ASC",
            items = kind.items_table(),
            tags = kind.tags_table(),
            id = kind.id_column(),
        );
        let rows = sqlx::query_as::<_, (Option<i64>, i64, String)>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(Self::item_tags(kind, rows))
    }

    fn item_tags(kind: ItemType, rows: Vec<(Option<i64>, i64, String)>) -> Vec<ItemTag> {
        rows.into_iter()
            .map(|(tag, id, name)| ItemTag {
                item: Item::new(kind, from_sql(id), name),
                tag: tag.map(from_sql),
            })
            .collect()
    }

    pub async fn get_all_tags(&self) -> Result<Vec<TagId>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| from_sql(id)).collect())
    }

    /// Forgets the tag. Imported items are kept.
    pub async fn remove_tag(&self, tag: TagId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for kind in ItemType::ALL {
            let sql = format!("DELETE FROM {} WHERE tag_id = ?", kind.tags_table());
            sqlx::query(&sql).bind(to_sql(tag)).execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(to_sql(tag))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(id: u64, name: &str) -> Item {
        Item::new(ItemType::Game, id, name)
    }

    fn platform(id: u64, name: &str) -> Item {
        Item::new(ItemType::Platform, id, name)
    }

    #[tokio::test]
    async fn add_item_reports_duplicates() {
        let repo = Repository::in_memory().await.unwrap();

        assert!(repo.add_item(&game(80207, "Guilty Gear Strive")).await.unwrap());
        assert!(!repo.add_item(&game(80207, "Guilty Gear Strive")).await.unwrap());
        // Same id in another table is a different item.
        assert!(repo.add_item(&platform(80207, "Odd")).await.unwrap());
    }

    #[tokio::test]
    async fn tagged_items_are_found_by_tag() {
        let repo = Repository::in_memory().await.unwrap();
        let strive = game(80207, "Guilty Gear Strive");
        repo.add_item(&strive).await.unwrap();
        repo.add_item_tag(&strive, 1001).await.unwrap();

        assert_eq!(
            repo.find_item_by_tag(ItemType::Game, 1001).await.unwrap(),
            Some(strive.clone())
        );
        assert_eq!(repo.find_item_by_tag(ItemType::Platform, 1001).await.unwrap(), None);
        assert_eq!(repo.find_any_item_by_tag(1001).await.unwrap(), Some(strive));
        assert_eq!(repo.find_any_item_by_tag(1002).await.unwrap(), None);
    }

    #[tokio::test]
    async fn any_item_falls_back_to_platforms() {
        let repo = Repository::in_memory().await.unwrap();
        let pc = platform(6, "PC (Microsoft Windows)");
        repo.add_item(&pc).await.unwrap();
        repo.add_item_tag(&pc, 2001).await.unwrap();

        assert_eq!(repo.find_any_item_by_tag(2001).await.unwrap(), Some(pc));
    }

    #[tokio::test]
    async fn item_tags_are_filtered_and_sorted_by_name() {
        let repo = Repository::in_memory().await.unwrap();
        let items = [
            (game(3, "Tekken 8"), 13),
            (game(1, "Blazblue Centralfiction"), 11),
            (game(2, "Melty Blood"), 12),
        ];
        for (item, tag) in &items {
            repo.add_item(item).await.unwrap();
            repo.add_item_tag(item, *tag).await.unwrap();
        }

        let found = repo
            .find_item_tags_by_tags(ItemType::Game, &[13, 11, 99])
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|it| it.item.name.as_str()).collect();

        assert_eq!(names, vec!["Blazblue Centralfiction", "Tekken 8"]);
        assert_eq!(found[0].tag, Some(11));
        assert!(repo
            .find_item_tags_by_tags(ItemType::Game, &[])
            .await
            .unwrap()
            .is_empty());
        assert!(repo
            .find_item_tags_by_tags(ItemType::Platform, &[11])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn all_items_include_untagged_ones() {
        let repo = Repository::in_memory().await.unwrap();
        let tagged = game(1, "Under Night In-Birth");
        let untagged = game(2, "Arcana Heart");
        repo.add_item(&tagged).await.unwrap();
        repo.add_item(&untagged).await.unwrap();
        repo.add_item_tag(&tagged, 500).await.unwrap();

        let all = repo.find_all_items(ItemType::Game).await.unwrap();

        assert_eq!(
            all,
            vec![
                ItemTag { item: untagged, tag: None },
                ItemTag { item: tagged, tag: Some(500) },
            ]
        );
    }

    #[tokio::test]
    async fn retagging_moves_the_association() {
        let repo = Repository::in_memory().await.unwrap();
        let sf6 = game(1, "Street Fighter 6");
        let ps5 = platform(167, "PlayStation 5");
        repo.add_item(&sf6).await.unwrap();
        repo.add_item(&ps5).await.unwrap();

        repo.add_item_tag(&sf6, 1).await.unwrap();
        // Same item, new tag: the old tag no longer points at it.
        repo.add_item_tag(&sf6, 2).await.unwrap();
        assert_eq!(repo.find_item_by_tag(ItemType::Game, 1).await.unwrap(), None);
        assert_eq!(repo.find_item_by_tag(ItemType::Game, 2).await.unwrap(), Some(sf6));

        // Same tag, item of another type.
        repo.add_item_tag(&ps5, 2).await.unwrap();
        assert_eq!(repo.find_item_by_tag(ItemType::Game, 2).await.unwrap(), None);
        assert_eq!(repo.find_any_item_by_tag(2).await.unwrap(), Some(ps5));

        assert_eq!(repo.get_all_tags().await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn removing_a_tag_keeps_the_item() {
        let repo = Repository::in_memory().await.unwrap();
        let gg = game(7, "Guilty Gear");
        repo.add_item(&gg).await.unwrap();
        repo.add_item_tag(&gg, 70).await.unwrap();

        repo.remove_tag(70).await.unwrap();

        assert!(repo.get_all_tags().await.unwrap().is_empty());
        assert_eq!(repo.find_any_item_by_tag(70).await.unwrap(), None);
        assert_eq!(
            repo.find_all_items(ItemType::Game).await.unwrap(),
            vec![ItemTag { item: gg, tag: None }]
        );
    }

    #[tokio::test]
    async fn large_snowflakes_survive() {
        let repo = Repository::in_memory().await.unwrap();
        let item = game(42, "Big");
        let tag: TagId = 1_152_921_504_606_846_976;
        repo.add_item(&item).await.unwrap();
        repo.add_item_tag(&item, tag).await.unwrap();

        assert_eq!(repo.get_all_tags().await.unwrap(), vec![tag]);
    }

    #[tokio::test]
    async fn tagging_an_unknown_item_fails() {
        let repo = Repository::in_memory().await.unwrap();

        assert!(repo.add_item_tag(&game(1, "Missing"), 1).await.is_err());
    }
}
