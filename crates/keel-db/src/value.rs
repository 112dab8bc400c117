//! Backend-neutral statement arguments and column values.

use std::fmt;

use bytes::BytesMut;
use postgres::types::{IsNull, ToSql, Type, WrongType};
use rusqlite::types::{ToSqlOutput, ValueRef};

/// A bound argument or a fetched column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders the value quoted, for row logging.
    pub fn quoted(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(v) => format!("\"{v}\""),
            Self::Real(v) => format!("\"{v}\""),
            Self::Text(v) => format!("{v:?}"),
            Self::Blob(v) => format!("\"{}\"", String::from_utf8_lossy(v).escape_debug()),
            Self::Bool(v) => format!("\"{v}\""),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(r) => Self::Real(r),
            ValueRef::Text(t) => Self::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Self::Blob(b.to_vec()),
        }
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Self::Integer(v) => ToSqlOutput::from(*v),
            Self::Real(v) => ToSqlOutput::from(*v),
            Self::Text(v) => ToSqlOutput::from(v.as_str()),
            Self::Blob(v) => ToSqlOutput::from(v.as_slice()),
            Self::Bool(v) => ToSqlOutput::from(*v),
        })
    }
}

impl Value {
    /// Whether this value can be sent for a parameter of type `ty`.
    ///
    /// `Null` binds to anything; other variants only to the types they
    /// encode without conversion on the server.
    fn binds_to(&self, ty: &Type) -> bool {
        match self {
            Self::Null => true,
            Self::Integer(_) => {
                *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 || *ty == Type::OID
            }
            Self::Real(_) => *ty == Type::FLOAT4 || *ty == Type::FLOAT8,
            Self::Text(_) => <&str as ToSql>::accepts(ty),
            Self::Blob(_) => <&[u8] as ToSql>::accepts(ty),
            Self::Bool(_) => <bool as ToSql>::accepts(ty),
        }
    }
}

// PostgreSQL is strictly typed, so integers and floats are narrowed to the
// parameter type the server inferred for the placeholder.
impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Integer(v) if *ty == Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
            Self::Integer(v) if *ty == Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
            Self::Integer(v) if *ty == Type::OID => u32::try_from(*v)?.to_sql(ty, out),
            Self::Integer(v) => v.to_sql(ty, out),
            #[allow(clippy::cast_possible_truncation)]
            Self::Real(v) if *ty == Type::FLOAT4 => (*v as f32).to_sql(ty, out),
            Self::Real(v) => v.to_sql(ty, out),
            Self::Text(v) => v.as_str().to_sql(ty, out),
            Self::Blob(v) => v.as_slice().to_sql(ty, out),
            Self::Bool(v) => v.to_sql(ty, out),
        }
    }

    // The variant is only known per value, so the type check happens in
    // `to_sql_checked` rather than here.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        if !self.binds_to(ty) {
            return Err(Box::new(WrongType::new::<Value>(ty.clone())));
        }
        self.to_sql(ty, out)
    }
}
