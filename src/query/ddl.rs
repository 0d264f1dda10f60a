//! Schema definition statements.
//!
//! Definitions are plain data (serde-friendly, so they can live in config
//! files) and render to one or more statements each.

use serde::{Deserialize, Serialize};

/// `ALTER` attribute of a class or property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attribute {
    /// `ATTRIBUTE value`
    Set {
        /// Attribute name, uppercased when rendered.
        name: String,
        /// Raw value.
        value: String,
    },
    /// `CUSTOM key = value`
    Custom {
        /// Custom key.
        key: String,
        /// Raw value.
        value: String,
    },
}

impl Attribute {
    /// `ATTRIBUTE value`
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute::Set {
            name: name.into(),
            value: value.into(),
        }
    }

    /// `CUSTOM key = value`
    pub fn custom(key: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute::Custom {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Property declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property name.
    pub name: String,
    /// Type keyword (`STRING`, `LINKLIST`, ...).
    #[serde(rename = "type")]
    pub ty: String,
    /// Linked class of link types.
    #[serde(default)]
    pub linked_class: Option<String>,
    /// Linked type of embedded containers; ignored when a linked class is set.
    #[serde(default)]
    pub linked_type: Option<String>,
    /// Attributes applied after creation.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl PropertyDef {
    /// Property of type `ty`.
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            linked_class: None,
            linked_type: None,
            attributes: Vec::new(),
        }
    }

    /// Links to `class`.
    pub fn linked_class(mut self, class: impl Into<String>) -> Self {
        self.linked_class = Some(class.into());
        self
    }

    /// Contains values of `ty`.
    pub fn linked_type(mut self, ty: impl Into<String>) -> Self {
        self.linked_type = Some(ty.into());
        self
    }

    /// Adds an attribute.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Index declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name; prefixed with the class when paths are given.
    pub name: String,
    /// Index type (`UNIQUE`, `NOTUNIQUE`, `FULLTEXT`, ...).
    #[serde(rename = "type")]
    pub ty: String,
    /// Indexed properties.
    #[serde(default)]
    pub paths: Vec<String>,
    /// `METADATA {key : value}` entries.
    #[serde(default)]
    pub metadata: Vec<(String, String)>,
}

impl IndexDef {
    /// Index of type `ty` over `paths`.
    pub fn new<I, S>(name: impl Into<String>, ty: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            ty: ty.into(),
            paths: paths.into_iter().map(Into::into).collect(),
            metadata: Vec::new(),
        }
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Class declaration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassDef {
    /// Class name.
    pub name: String,
    /// Parent class.
    pub super_class: Option<String>,
    /// Abstract classes take no cluster.
    pub is_abstract: bool,
    /// Explicit cluster id.
    pub cluster: Option<String>,
    /// Attributes applied after creation.
    pub attributes: Vec<Attribute>,
    /// Properties created after the class.
    pub properties: Vec<PropertyDef>,
    /// Indexes created last.
    pub indexes: Vec<IndexDef>,
}

impl ClassDef {
    /// Empty class named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// `EXTENDS parent`
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.super_class = Some(parent.into());
        self
    }

    /// `ABSTRACT`
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// `CLUSTER id`
    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// Adds an attribute.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a property.
    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds an index.
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }
}

/// `CREATE CLASS` followed by its attributes, properties, and indexes.
pub fn create_class(def: &ClassDef) -> Vec<String> {
    let mut head = format!("CREATE CLASS {}", def.name);
    if let Some(parent) = &def.super_class {
        head.push_str(&format!(" EXTENDS {parent}"));
    }
    if def.is_abstract {
        head.push_str(" ABSTRACT");
    } else if let Some(cluster) = &def.cluster {
        head.push_str(&format!(" CLUSTER {cluster}"));
    }
    let mut sql = vec![head];
    sql.extend(alter_class(&def.name, &def.attributes));
    for property in &def.properties {
        sql.extend(create_property(&def.name, property));
    }
    for index in &def.indexes {
        sql.extend(create_index(index, Some(&def.name)));
    }
    sql
}

/// `ALTER CLASS` per attribute.
pub fn alter_class(class: &str, attributes: &[Attribute]) -> Vec<String> {
    attributes
        .iter()
        .map(|attribute| match attribute {
            Attribute::Set { name, value } => {
                format!("ALTER CLASS {class} {} {value}", name.to_uppercase())
            }
            Attribute::Custom { key, value } => {
                format!("ALTER CLASS {class} CUSTOM {key} = {value}")
            }
        })
        .collect()
}

/// `DROP CLASS`
pub fn drop_class(class: &str) -> Vec<String> {
    vec![format!("DROP CLASS {class}")]
}

/// `TRUNCATE CLASS`
pub fn truncate_class(class: &str) -> Vec<String> {
    vec![format!("TRUNCATE CLASS {class}")]
}

/// `CREATE PROPERTY` followed by its attributes.
pub fn create_property(class: &str, def: &PropertyDef) -> Vec<String> {
    let mut head = format!("CREATE PROPERTY {class}.{} {}", def.name, def.ty.to_uppercase());
    if let Some(linked) = &def.linked_class {
        head.push_str(&format!(" {linked}"));
    } else if let Some(linked) = &def.linked_type {
        head.push_str(&format!(" {}", linked.to_uppercase()));
    }
    let mut sql = vec![head];
    sql.extend(alter_property(class, &def.name, &def.attributes));
    sql
}

/// `ALTER PROPERTY` per attribute; `TYPE` and `LINKEDTYPE` values are uppercased.
pub fn alter_property(class: &str, property: &str, attributes: &[Attribute]) -> Vec<String> {
    attributes
        .iter()
        .map(|attribute| match attribute {
            Attribute::Set { name, value } => {
                let name = name.to_uppercase();
                let value = if name == "TYPE" || name == "LINKEDTYPE" {
                    value.to_uppercase()
                } else {
                    value.clone()
                };
                format!("ALTER PROPERTY {class}.{property} {name} {value}")
            }
            Attribute::Custom { key, value } => {
                format!("ALTER PROPERTY {class}.{property} CUSTOM {key} = {value}")
            }
        })
        .collect()
}

/// `DROP PROPERTY`
pub fn drop_property(class: &str, property: &str) -> Vec<String> {
    vec![format!("DROP PROPERTY {class}.{property}")]
}

/// `CREATE INDEX`; class-scoped when both a class and paths are given.
pub fn create_index(def: &IndexDef, class: Option<&str>) -> Vec<String> {
    let mut sql = String::from("CREATE INDEX ");
    match class {
        Some(class) if !def.paths.is_empty() => {
            sql.push_str(&format!(
                "{class}.{} ON {class} ({}) ",
                def.name,
                def.paths.join(", ")
            ));
        }
        _ => {
            sql.push_str(&def.name);
            sql.push(' ');
            if !def.paths.is_empty() {
                sql.push_str(&format!("({}) ", def.paths.join(", ")));
            }
        }
    }
    sql.push_str(&def.ty.to_uppercase());
    if !def.metadata.is_empty() {
        let entries: Vec<String> = def
            .metadata
            .iter()
            .map(|(key, value)| format!("{key} : {value}"))
            .collect();
        sql.push_str(&format!(" METADATA {{{}}}", entries.join(", ")));
    }
    vec![sql]
}

/// `DROP INDEX`
pub fn drop_index(name: &str, class: Option<&str>) -> Vec<String> {
    vec![format!("DROP INDEX {}", qualified(name, class))]
}

/// `REBUILD INDEX name`, or `REBUILD INDEX *` when no name is given.
pub fn rebuild_index(name: Option<&str>, class: Option<&str>) -> Vec<String> {
    match name {
        Some(name) => vec![format!("REBUILD INDEX {}", qualified(name, class))],
        None => vec!["REBUILD INDEX *".to_string()],
    }
}

fn qualified(name: &str, class: Option<&str>) -> String {
    match class {
        Some(class) => format!("{class}.{name}"),
        None => name.to_string(),
    }
}
