#[cfg(feature = "json")]
use std::fmt;
#[cfg(feature = "json")]
use std::marker::PhantomData;

use crate::error::Error;
use crate::Response;

/// Turns a completed [`Response`] into some other type.
///
/// Any `Fn(Response) -> Result<T, Error>` is a mapper, so a closure works
/// wherever a mapper is expected.
pub trait ResponseMapper<T> {
    fn map(&self, response: Response) -> Result<T, Error>;
}

impl<T, F> ResponseMapper<T> for F
where
    F: Fn(Response) -> Result<T, Error>,
{
    fn map(&self, response: Response) -> Result<T, Error> {
        self(response)
    }
}

/// Deserializes a JSON response body into `T`.
///
/// An empty (or all whitespace) body maps to `None`. A body that isn't valid
/// JSON for `T` fails with [`ErrorKind::Mapping`](crate::ErrorKind::Mapping).
///
/// ```no_run
/// use simplehttp::JsonMapper;
///
/// #[derive(serde::Deserialize)]
/// struct User {
///     name: String,
/// }
///
/// let user: Option<User> = simplehttp::get("http://example.com/user/1")
///     .map(JsonMapper::<User>::for_type())?;
/// # Ok::<(), simplehttp::Error>(())
/// ```
#[cfg(feature = "json")]
pub struct JsonMapper<T> {
    _target: PhantomData<fn() -> T>,
}

#[cfg(feature = "json")]
impl<T> JsonMapper<T> {
    pub fn for_type() -> Self {
        JsonMapper {
            _target: PhantomData,
        }
    }
}

#[cfg(feature = "json")]
impl<T> Clone for JsonMapper<T> {
    fn clone(&self) -> Self {
        JsonMapper::for_type()
    }
}

#[cfg(feature = "json")]
impl<T> fmt::Debug for JsonMapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "JsonMapper<{}>", std::any::type_name::<T>())
    }
}

#[cfg(feature = "json")]
impl<T: serde::de::DeserializeOwned> ResponseMapper<Option<T>> for JsonMapper<T> {
    fn map(&self, response: Response) -> Result<Option<T>, Error> {
        if response.body().iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        response.into_json().map(Some)
    }
}
