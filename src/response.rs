//! Paged collections and per-entity decoding.
//!
//! Collection endpoints answer with `{"data": [...], "total_count": N}`. Each
//! element of `data` is handed, as JSON text, to an [`EntityFactory`] which
//! produces the typed entity; the results are wrapped in a [`PagedList`]
//! together with the requested offset and the server's total count.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::marker::PhantomData;

/// One page of a server-side collection.
///
/// The server is expected (not checked) to return at most `limit` items and
/// `offset + items.len() <= total_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedList<E> {
    /// Decoded entities in response order
    pub items: Vec<E>,
    /// Offset the page was requested at
    pub offset: u32,
    /// Size of the whole collection as reported by the server
    pub total_count: u64,
}

impl<E> PagedList<E> {
    /// Creates a new `PagedList`.
    pub fn new(items: Vec<E>, offset: u32, total_count: u64) -> Self {
        Self {
            items,
            offset,
            total_count,
        }
    }

    /// Maps the items to a different type, keeping offset and total.
    pub fn map<U, F>(self, f: F) -> PagedList<U>
    where
        F: FnMut(E) -> U,
    {
        PagedList {
            items: self.items.into_iter().map(f).collect(),
            offset: self.offset,
            total_count: self.total_count,
        }
    }

    /// Returns `true` if the server has items past this page.
    ///
    /// ```
    /// use mqm_rest::PagedList;
    ///
    /// let page = PagedList::new(vec![1, 2], 0, 5);
    /// assert!(page.has_more());
    /// assert!(!PagedList::new(vec![3, 4, 5], 2, 5).has_more());
    /// ```
    pub fn has_more(&self) -> bool {
        (self.offset as u64) + (self.items.len() as u64) < self.total_count
    }
}

impl<E> std::ops::Deref for PagedList<E> {
    type Target = [E];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<E> IntoIterator for PagedList<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Creates one entity from the JSON text of a single collection element.
///
/// Closures of the form `Fn(&str) -> Result<E>` are factories:
///
/// ```
/// use mqm_rest::{EntityFactory, Result};
///
/// let ids = |json: &str| -> Result<String> { Ok(json.to_uppercase()) };
/// assert_eq!(ids.create(r#"{"id":"a"}"#).unwrap(), r#"{"ID":"A"}"#);
/// ```
pub trait EntityFactory<E>: Send + Sync {
    /// Decodes one entity.
    fn create(&self, json: &str) -> Result<E>;
}

impl<E, F> EntityFactory<E> for F
where
    F: Fn(&str) -> Result<E> + Send + Sync,
{
    fn create(&self, json: &str) -> Result<E> {
        self(json)
    }
}

/// A factory for any `serde` deserializable entity.
#[derive(Debug)]
pub struct SerdeFactory<E> {
    _entity: PhantomData<fn() -> E>,
}

impl<E> Default for SerdeFactory<E> {
    fn default() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<E: DeserializeOwned> EntityFactory<E> for SerdeFactory<E> {
    fn create(&self, json: &str) -> Result<E> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization {
            raw_response: json.to_string(),
            serde_error: e.to_string(),
        })
    }
}

/// Returns a [`SerdeFactory`] for `E`.
pub fn serde_factory<E: DeserializeOwned>() -> SerdeFactory<E> {
    SerdeFactory::default()
}

#[derive(Deserialize)]
struct CollectionBody {
    data: Vec<Box<RawValue>>,
    total_count: u64,
}

/// Decodes a collection body into a [`PagedList`].
///
/// ```
/// use mqm_rest::response::{decode_paged_list, serde_factory};
///
/// #[derive(serde::Deserialize)]
/// struct Item { id: u32 }
///
/// let page = decode_paged_list(
///     r#"{"data":[{"id":1},{"id":2}],"total_count":2}"#,
///     0,
///     &serde_factory::<Item>(),
/// )
/// .unwrap();
/// assert_eq!(page.items.iter().map(|i| i.id).collect::<Vec<_>>(), [1, 2]);
/// ```
pub fn decode_paged_list<E, F>(body: &str, offset: u32, factory: &F) -> Result<PagedList<E>>
where
    F: EntityFactory<E> + ?Sized,
{
    let collection: CollectionBody = serde_json::from_str(body).map_err(|e| {
        tracing::error!(error = %e, raw_response = %body, "Failed to deserialize collection");
        Error::Deserialization {
            raw_response: body.to_string(),
            serde_error: e.to_string(),
        }
    })?;

    let items = collection
        .data
        .iter()
        .map(|entity| factory.create(entity.get()))
        .collect::<Result<Vec<_>>>()?;

    Ok(PagedList::new(items, offset, collection.total_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Entity {
        id: u32,
    }

    #[test]
    fn test_decode_preserves_order() {
        let page = decode_paged_list(
            r#"{"data":[{"id":1},{"id":2}],"total_count":2}"#,
            0,
            &serde_factory::<Entity>(),
        )
        .unwrap();

        assert_eq!(page.items, vec![Entity { id: 1 }, Entity { id: 2 }]);
        assert_eq!(page.offset, 0);
        assert_eq!(page.total_count, 2);
        assert!(!page.has_more());
    }

    #[test]
    fn test_factory_sees_element_text() {
        let factory = |json: &str| -> Result<String> { Ok(json.to_string()) };
        let page = decode_paged_list(
            r#"{"data":[{"id":3,"name":"x"}],"total_count":10}"#,
            5,
            &factory,
        )
        .unwrap();

        let element: serde_json::Value = serde_json::from_str(&page.items[0]).unwrap();
        assert_eq!(element["id"], 3);
        assert_eq!(element["name"], "x");
        assert_eq!(page.offset, 5);
        assert!(page.has_more());
    }

    #[test]
    fn test_factory_sees_server_text_verbatim() {
        let factory = |json: &str| -> Result<String> { Ok(json.to_string()) };
        let page = decode_paged_list(
            r#"{"data":[{"z":1,"a":2.50}, {"name":"b", "id":7}],"total_count":2}"#,
            0,
            &factory,
        )
        .unwrap();

        assert_eq!(page.items, vec![r#"{"z":1,"a":2.50}"#, r#"{"name":"b", "id":7}"#]);
    }

    #[test]
    fn test_missing_total_count_is_an_error() {
        let result = decode_paged_list(r#"{"data":[]}"#, 0, &serde_factory::<Entity>());
        assert!(matches!(result, Err(Error::Deserialization { .. })));
    }

    #[test]
    fn test_factory_error_propagates() {
        let result = decode_paged_list(
            r#"{"data":[{"id":"not a number"}],"total_count":1}"#,
            0,
            &serde_factory::<Entity>(),
        );

        match result {
            Err(Error::Deserialization { raw_response, .. }) => {
                assert_eq!(raw_response, r#"{"id":"not a number"}"#);
            }
            other => panic!("Expected Deserialization, got {:?}", other),
        }
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = PagedList::new(vec![1, 2], 4, 9).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.offset, 4);
        assert_eq!(page.total_count, 9);
        assert_eq!(page.len(), 2);
    }
}
