//! Front-end type descriptors.
//!
//! A [`TypeDescriptor`] is how the front end names a static type. The catalog
//! binds descriptors to host types; their [`Display`](fmt::Display) form is
//! also the display name of the bound host type.

use std::fmt;

/// A type as the front end sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// The absent return type.
    Void,
    /// A named type, optionally closed over type arguments.
    Named {
        name: String,
        type_args: Vec<TypeDescriptor>,
    },
    /// An array of `element` with `rank` dimensions.
    Array {
        element: Box<TypeDescriptor>,
        rank: u8,
    },
    /// An unbound generic parameter such as `T`.
    GenericParameter { name: String },
}

impl TypeDescriptor {
    /// A non-generic named type.
    pub fn named(name: impl Into<String>) -> Self {
        TypeDescriptor::Named {
            name: name.into(),
            type_args: Vec::new(),
        }
    }

    /// A named generic type closed over `type_args`.
    pub fn generic(name: impl Into<String>, type_args: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Named {
            name: name.into(),
            type_args,
        }
    }

    /// A single-dimension array of `element`.
    pub fn array(element: TypeDescriptor) -> Self {
        Self::array_of_rank(element, 1)
    }

    pub fn array_of_rank(element: TypeDescriptor, rank: u8) -> Self {
        TypeDescriptor::Array {
            element: Box::new(element),
            rank,
        }
    }

    pub fn generic_parameter(name: impl Into<String>) -> Self {
        TypeDescriptor::GenericParameter { name: name.into() }
    }

    pub fn int() -> Self {
        Self::named("int")
    }

    pub fn int64() -> Self {
        Self::named("int64")
    }

    pub fn uint() -> Self {
        Self::named("uint")
    }

    pub fn uint64() -> Self {
        Self::named("uint64")
    }

    pub fn float() -> Self {
        Self::named("float")
    }

    pub fn double() -> Self {
        Self::named("double")
    }

    pub fn bool() -> Self {
        Self::named("bool")
    }

    pub fn string() -> Self {
        Self::named("string")
    }

    pub fn object() -> Self {
        Self::named("object")
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescriptor::Void)
    }

    /// True if this descriptor mentions an unbound generic parameter anywhere.
    pub fn contains_generic_parameters(&self) -> bool {
        match self {
            TypeDescriptor::Void => false,
            TypeDescriptor::GenericParameter { .. } => true,
            TypeDescriptor::Named { type_args, .. } => {
                type_args.iter().any(TypeDescriptor::contains_generic_parameters)
            }
            TypeDescriptor::Array { element, .. } => element.contains_generic_parameters(),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Void => write!(f, "void"),
            TypeDescriptor::GenericParameter { name } => write!(f, "{name}"),
            TypeDescriptor::Named { name, type_args } => {
                write!(f, "{name}")?;
                if !type_args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in type_args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeDescriptor::Array { element, rank } => {
                write!(f, "{element}[")?;
                for _ in 1..*rank {
                    write!(f, ",")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TypeDescriptor::int(), "int")]
    #[case(TypeDescriptor::Void, "void")]
    #[case(TypeDescriptor::generic("IEnumerable", vec![TypeDescriptor::int()]), "IEnumerable<int>")]
    #[case(
        TypeDescriptor::generic("Func", vec![TypeDescriptor::int(), TypeDescriptor::string()]),
        "Func<int, string>"
    )]
    #[case(TypeDescriptor::array(TypeDescriptor::int()), "int[]")]
    #[case(TypeDescriptor::array_of_rank(TypeDescriptor::double(), 2), "double[,]")]
    #[case(TypeDescriptor::array_of_rank(TypeDescriptor::double(), 3), "double[,,]")]
    #[case(
        TypeDescriptor::array(TypeDescriptor::generic("Nullable", vec![TypeDescriptor::int()])),
        "Nullable<int>[]"
    )]
    fn display_names(#[case] descriptor: TypeDescriptor, #[case] expected: &str) {
        assert_eq!(descriptor.to_string(), expected);
    }

    #[test]
    fn generic_parameter_detection() {
        let open = TypeDescriptor::generic(
            "IEnumerable",
            vec![TypeDescriptor::generic_parameter("T")],
        );
        assert!(open.contains_generic_parameters());
        assert!(TypeDescriptor::array(TypeDescriptor::generic_parameter("T")).contains_generic_parameters());
        assert!(!TypeDescriptor::array(TypeDescriptor::int()).contains_generic_parameters());
    }
}
