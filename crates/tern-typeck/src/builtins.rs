//! Functions every package can call without a `use`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Println,
    /// Never returns; counts as a terminating statement.
    Panic,
    Len,
    Append,
    Delete,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        Some(match name {
            "print" => Builtin::Print,
            "println" => Builtin::Println,
            "panic" => Builtin::Panic,
            "len" => Builtin::Len,
            "append" => Builtin::Append,
            "delete" => Builtin::Delete,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Println => "println",
            Builtin::Panic => "panic",
            Builtin::Len => "len",
            Builtin::Append => "append",
            Builtin::Delete => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for b in [
            Builtin::Print,
            Builtin::Println,
            Builtin::Panic,
            Builtin::Len,
            Builtin::Append,
            Builtin::Delete,
        ] {
            assert_eq!(Builtin::from_name(b.name()), Some(b));
        }
        assert_eq!(Builtin::from_name("printf"), None);
    }
}
