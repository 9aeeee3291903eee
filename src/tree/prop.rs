/// The value of a single device tree property.
///
/// Properties are treated as opaque typed data: either a run of 32-bit
/// cells, a list of strings, or nothing at all (a marker property such as
/// `lockstep;`). The engine never interprets cell contents except through a
/// registered [`Schema`](crate::schema::Schema).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropValue {
    /// A bare marker property with no value.
    Empty,
    /// A sequence of 32-bit cells.
    Cells(Vec<u32>),
    /// A sequence of strings.
    Strings(Vec<String>),
}

impl PropValue {
    /// Build a single-cell value.
    pub fn cell(v: u32) -> PropValue {
        PropValue::Cells(vec![v])
    }

    /// Build a single-string value.
    pub fn string(s: &str) -> PropValue {
        PropValue::Strings(vec![s.to_string()])
    }

    /// The raw cells, if this is a cell value.
    pub fn as_cells(&self) -> Option<&[u32]> {
        match self {
            PropValue::Cells(c) => Some(c),
            _ => None,
        }
    }

    /// The strings, if this is a string value.
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            PropValue::Strings(s) => Some(s),
            _ => None,
        }
    }

    /// The first string of a string value, if any.
    pub fn first_string(&self) -> Option<&str> {
        self.as_strings().and_then(|s| s.first()).map(|s| s.as_str())
    }
}

/// A named property attached to a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prop {
    pub name: String,
    pub value: PropValue,
}

impl Prop {
    pub fn new(name: &str, value: PropValue) -> Prop {
        Prop {
            name: name.to_string(),
            value,
        }
    }
}
