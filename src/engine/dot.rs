use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single cell of the playground. Serialized as the two-element array
/// `[x, y]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dot {
    pub x: u8,
    pub y: u8,
}

impl Dot {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Dot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

impl Serialize for Dot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.x)?;
        tuple.serialize_element(&self.y)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for Dot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (x, y) = <(u8, u8)>::deserialize(deserializer)?;
        Ok(Dot { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_coordinate_pair() {
        let dot = Dot::new(3, 14);
        assert_eq!(serde_json::to_string(&dot).unwrap(), "[3,14]");
        assert_eq!(serde_json::from_str::<Dot>("[3,14]").unwrap(), dot);
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(Dot::new(1, 2), Dot::new(1, 2));
        assert_ne!(Dot::new(1, 2), Dot::new(2, 1));
    }
}
