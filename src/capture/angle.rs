use serde::{Deserialize, Serialize};

/// Head pose targeted by one capture step. Captured in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Angle {
    #[default]
    #[serde(rename = "frontal")]
    Frontal,
    #[serde(rename = "izquierda")]
    Left,
    #[serde(rename = "derecha")]
    Right,
}

impl Angle {
    pub const ALL: [Angle; 3] = [Angle::Frontal, Angle::Left, Angle::Right];

    /// Identifier used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Angle::Frontal => "frontal",
            Angle::Left => "izquierda",
            Angle::Right => "derecha",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Angle::Frontal => 0,
            Angle::Left => 1,
            Angle::Right => 2,
        }
    }

    /// The angle captured after this one, if any.
    pub fn next(&self) -> Option<Angle> {
        Angle::ALL.get(self.index() + 1).copied()
    }

    /// The angle to capture once `confirmed` captures are done.
    pub fn for_progress(confirmed: u8) -> Option<Angle> {
        Angle::ALL.get(confirmed as usize).copied()
    }
}

impl std::fmt::Display for Angle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_order() {
        assert_eq!(Angle::Frontal.next(), Some(Angle::Left));
        assert_eq!(Angle::Left.next(), Some(Angle::Right));
        assert_eq!(Angle::Right.next(), None);
        assert_eq!(Angle::for_progress(0), Some(Angle::Frontal));
        assert_eq!(Angle::for_progress(2), Some(Angle::Right));
        assert_eq!(Angle::for_progress(3), None);
    }

    #[test]
    fn test_wire_names_match_serde() {
        for angle in Angle::ALL {
            let json = serde_json::to_string(&angle).unwrap();
            assert_eq!(json, format!("\"{}\"", angle.as_str()));
        }
    }
}
