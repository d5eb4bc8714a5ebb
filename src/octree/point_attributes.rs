use std::fmt;

/// Physical type of one point record field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeDataType {
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl AttributeDataType {
    /// Maps a manifest `(type, size)` pair. Order matters: floats first, then
    /// any single byte field, then the two and four byte integers.
    pub fn from_manifest(type_tag: &str, size: u64) -> Option<Self> {
        match (type_tag, size) {
            ("float", 4) => Some(Self::Float32),
            ("float", 8) => Some(Self::Float64),
            (_, 1) => Some(Self::Int8),
            ("unsigned", 2) => Some(Self::UInt16),
            (_, 2) => Some(Self::Int16),
            (_, 4) => Some(Self::Int32),
            _ => None,
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

impl fmt::Display for AttributeDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int8 => "int8",
            Self::UInt16 => "uint16",
            Self::Int16 => "int16",
            Self::UInt32 => "uint32",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub data_type: AttributeDataType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: AttributeDataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.data_type.size_bytes()
    }
}

/// Ordered record layout. Names are unique.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeSchema {
    attributes: Vec<Attribute>,
}

impl AttributeSchema {
    /// Returns `Err(name)` on the first duplicated attribute name.
    pub fn new(attributes: Vec<Attribute>) -> Result<Self, String> {
        for (index, attribute) in attributes.iter().enumerate() {
            if attributes[..index].iter().any(|a| a.name == attribute.name) {
                return Err(attribute.name.clone());
            }
        }
        Ok(Self { attributes })
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn record_size(&self) -> usize {
        self.attributes.iter().map(Attribute::size_bytes).sum()
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Byte offset of `name` inside one record.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for attribute in &self.attributes {
            if attribute.name == name {
                return Some(offset);
            }
            offset += attribute.size_bytes();
        }
        None
    }

    /// Schema holding `names` in the requested order. Returns `Err(name)` for
    /// the first name this schema does not have, or the first repeated one.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<AttributeSchema, String> {
        let attributes = names
            .iter()
            .map(|name| {
                self.get(name.as_ref())
                    .cloned()
                    .ok_or_else(|| name.as_ref().to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;
        AttributeSchema::new(attributes)
    }
}

impl<'a> IntoIterator for &'a AttributeSchema {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}
