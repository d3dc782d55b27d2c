//! Shared record types for the cluster integration tests
//!
//! `Band` owns its `members` (one-to-many) and shares `genres` with other bands
//! (many-to-many) and orders its `songs` by a nullable float rating. `Album` is
//! a second parent with a `tags` relation.

#![allow(dead_code)]

use lifeguard_cluster::cluster::{ChildRef, ClusterableModel, HasMany, HoldingArea, ManyToMany};
use lifeguard_cluster::model::{set_field, ModelError, ModelMeta, ModelTrait, OrderBy};
use lifeguard_cluster::store::{MemoryStore, ThroughTable};
use lifeguard_cluster::value::ValueMap;
use sea_query::Value;

pub static BAND: ModelMeta = ModelMeta {
    table: "bands",
    primary_key: "id",
    columns: &["id", "name"],
    ordering: &[],
};

pub static BAND_MEMBER: ModelMeta = ModelMeta {
    table: "band_members",
    primary_key: "id",
    columns: &["id", "band_id", "name"],
    ordering: &[OrderBy::Asc("name")],
};

pub static SONG: ModelMeta = ModelMeta {
    table: "songs",
    primary_key: "id",
    columns: &["id", "band_id", "title", "rating"],
    ordering: &[OrderBy::Asc("rating"), OrderBy::Asc("title")],
};

pub static ALBUM: ModelMeta = ModelMeta {
    table: "albums",
    primary_key: "id",
    columns: &["id", "title"],
    ordering: &[],
};

pub static TAG: ModelMeta = ModelMeta {
    table: "tags",
    primary_key: "id",
    columns: &["id", "name"],
    ordering: &[],
};

pub const ALBUM_TAGS: ThroughTable = ThroughTable::new("album_tags", "album_id", "tag_id");
pub const BAND_GENRES: ThroughTable = ThroughTable::new("band_genres", "band_id", "tag_id");

pub static MEMBERS: HasMany<Band, BandMember> = HasMany::new("members", "band_id");
pub static SONGS: HasMany<Band, Song> = HasMany::new("songs", "band_id");
pub static GENRES: ManyToMany<Band, Tag> = ManyToMany::new("genres", BAND_GENRES);
pub static TAGS: ManyToMany<Album, Tag> = ManyToMany::new("tags", ALBUM_TAGS);

#[derive(Debug, Clone, Default)]
pub struct Band {
    pub id: Option<i64>,
    pub name: String,
    pub staged: HoldingArea,
}

impl Band {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn saved(id: i64, name: &str) -> Self {
        Self {
            id: Some(id),
            ..Self::new(name)
        }
    }
}

impl ModelTrait for Band {
    fn meta() -> &'static ModelMeta {
        &BAND
    }

    fn get(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(self.id)),
            "name" => Some(Value::String(Some(self.name.clone()))),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<(), ModelError> {
        match column {
            "id" => set_field(&mut self.id, column, value),
            "name" => set_field(&mut self.name, column, value),
            _ => Err(ModelError::ColumnNotFound(column.to_string())),
        }
    }
}

impl ClusterableModel for Band {
    fn holding_area(&self) -> &HoldingArea {
        &self.staged
    }

    fn holding_area_mut(&mut self) -> &mut HoldingArea {
        &mut self.staged
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandMember {
    pub id: Option<i64>,
    pub band_id: Option<i64>,
    pub name: String,
}

impl BandMember {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn saved(id: i64, band_id: i64, name: &str) -> Self {
        Self {
            id: Some(id),
            band_id: Some(band_id),
            name: name.to_string(),
        }
    }
}

impl ModelTrait for BandMember {
    fn meta() -> &'static ModelMeta {
        &BAND_MEMBER
    }

    fn get(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(self.id)),
            "band_id" => Some(Value::BigInt(self.band_id)),
            "name" => Some(Value::String(Some(self.name.clone()))),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<(), ModelError> {
        match column {
            "id" => set_field(&mut self.id, column, value),
            "band_id" => set_field(&mut self.band_id, column, value),
            "name" => set_field(&mut self.name, column, value),
            _ => Err(ModelError::ColumnNotFound(column.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Song {
    pub id: Option<i64>,
    pub band_id: Option<i64>,
    pub title: String,
    pub rating: Option<f64>,
}

impl Song {
    pub fn rated(title: &str, rating: Option<f64>) -> Self {
        Self {
            title: title.to_string(),
            rating,
            ..Default::default()
        }
    }
}

impl ModelTrait for Song {
    fn meta() -> &'static ModelMeta {
        &SONG
    }

    fn get(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(self.id)),
            "band_id" => Some(Value::BigInt(self.band_id)),
            "title" => Some(Value::String(Some(self.title.clone()))),
            "rating" => Some(Value::Double(self.rating)),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<(), ModelError> {
        match column {
            "id" => set_field(&mut self.id, column, value),
            "band_id" => set_field(&mut self.band_id, column, value),
            "title" => set_field(&mut self.title, column, value),
            "rating" => set_field(&mut self.rating, column, value),
            _ => Err(ModelError::ColumnNotFound(column.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Album {
    pub id: Option<i64>,
    pub title: String,
    pub staged: HoldingArea,
}

impl Album {
    pub fn saved(id: i64, title: &str) -> Self {
        Self {
            id: Some(id),
            title: title.to_string(),
            staged: HoldingArea::new(),
        }
    }
}

impl ModelTrait for Album {
    fn meta() -> &'static ModelMeta {
        &ALBUM
    }

    fn get(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(self.id)),
            "title" => Some(Value::String(Some(self.title.clone()))),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<(), ModelError> {
        match column {
            "id" => set_field(&mut self.id, column, value),
            "title" => set_field(&mut self.title, column, value),
            _ => Err(ModelError::ColumnNotFound(column.to_string())),
        }
    }
}

impl ClusterableModel for Album {
    fn holding_area(&self) -> &HoldingArea {
        &self.staged
    }

    fn holding_area_mut(&mut self) -> &mut HoldingArea {
        &mut self.staged
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: Option<i64>,
    pub name: String,
}

impl Tag {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
        }
    }

    pub fn saved(id: i64, name: &str) -> Self {
        Self {
            id: Some(id),
            name: name.to_string(),
        }
    }
}

impl ModelTrait for Tag {
    fn meta() -> &'static ModelMeta {
        &TAG
    }

    fn get(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(self.id)),
            "name" => Some(Value::String(Some(self.name.clone()))),
            _ => None,
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<(), ModelError> {
        match column {
            "id" => set_field(&mut self.id, column, value),
            "name" => set_field(&mut self.name, column, value),
            _ => Err(ModelError::ColumnNotFound(column.to_string())),
        }
    }
}

pub fn text(value: &str) -> Value {
    Value::String(Some(value.to_string()))
}

pub fn key(value: i64) -> Value {
    Value::BigInt(Some(value))
}

/// Seed a band row and its members
pub fn seed_band(store: &MemoryStore, band: &Band, members: &[BandMember]) {
    store.seed(&BAND, band.to_values());
    for member in members {
        store.seed(&BAND_MEMBER, member.to_values());
    }
}

/// Seed tag rows and link them to `parent_key` through `through`
pub fn seed_tags(store: &MemoryStore, through: &ThroughTable, parent_key: i64, tags: &[Tag]) {
    for tag in tags {
        store.seed(&TAG, tag.to_values());
        if let Some(id) = tag.id {
            store.seed_association(through, key(parent_key), key(id));
        }
    }
}

pub fn member_names(items: &[ChildRef<BandMember>]) -> Vec<String> {
    items.iter().map(|item| item.borrow().name.clone()).collect()
}

pub fn song_titles(items: &[ChildRef<Song>]) -> Vec<String> {
    items.iter().map(|item| item.borrow().title.clone()).collect()
}

pub fn tag_names(items: &[ChildRef<Tag>]) -> Vec<String> {
    items.iter().map(|item| item.borrow().name.clone()).collect()
}

/// Names of the stored rows of `meta`, in storage order
pub fn stored_names(store: &MemoryStore, meta: &ModelMeta) -> Vec<String> {
    store
        .rows(meta)
        .iter()
        .filter_map(|row: &ValueMap| match row.get("name") {
            Some(Value::String(Some(name))) => Some(name.clone()),
            _ => None,
        })
        .collect()
}
