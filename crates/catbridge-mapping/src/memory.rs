//! In-memory native catalog.
//!
//! Implements [`NativeClient`] over a fixed set of assets, evaluating native
//! queries directly (dotted paths, like-patterns, null tests, range
//! comparisons, nested ALL/ANY sets). Every call is counted so tests can
//! assert how often the mapping layer went back to the catalog.

use crate::client::{NativeClient, PageRequest, SearchPage};
use crate::query::{Combinator, Condition, ConditionSet, NativeOperator, NativeQuery, ID_PROPERTY};
use catbridge_model::{ClientError, NativeAsset, NativeRef, NativeValue, RefList, Rid, MODIFIED_ON, NAME};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default)]
struct CallLog {
    get_by_id: HashMap<Rid, usize>,
    properties: HashMap<(Rid, String), usize>,
    searches: usize,
    /// Properties left out of the next `get_by_id` of their asset.
    withheld: HashSet<(Rid, String)>,
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    assets: BTreeMap<Rid, NativeAsset>,
    failing: HashSet<Rid>,
    list_page_size: Option<usize>,
    log: Mutex<CallLog>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, asset: NativeAsset) -> Self {
        self.insert(asset);
        self
    }

    pub fn insert(&mut self, asset: NativeAsset) {
        self.assets.insert(asset.id().clone(), asset);
    }

    pub fn asset(&self, rid: &Rid) -> Option<&NativeAsset> {
        self.assets.get(rid)
    }

    /// Serve reference lists in pages of `size`.
    pub fn with_list_page_size(mut self, size: usize) -> Self {
        self.list_page_size = Some(size.max(1));
        self
    }

    /// Leave `property` out of the first fetch of `rid`, as the catalog does
    /// for link objects whose endpoints are not yet indexed.
    pub fn withhold(self, rid: impl Into<Rid>, property: &str) -> Self {
        self.log.lock().withheld.insert((rid.into(), property.to_string()));
        self
    }

    /// Fail every call touching `rid`.
    pub fn fail_on(mut self, rid: impl Into<Rid>) -> Self {
        self.failing.insert(rid.into());
        self
    }

    pub fn get_by_id_calls(&self, rid: &Rid) -> usize {
        self.log.lock().get_by_id.get(rid).copied().unwrap_or(0)
    }

    pub fn property_calls(&self, rid: &Rid, property: &str) -> usize {
        self.log
            .lock()
            .properties
            .get(&(rid.clone(), property.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Property fetches across every asset.
    pub fn total_property_calls(&self) -> usize {
        self.log.lock().properties.values().sum()
    }

    /// Largest number of fetches of any single property of any asset.
    pub fn max_property_calls(&self) -> usize {
        self.log.lock().properties.values().copied().max().unwrap_or(0)
    }

    pub fn search_calls(&self) -> usize {
        self.log.lock().searches
    }

    pub fn reset_calls(&self) {
        let mut log = self.log.lock();
        log.get_by_id.clear();
        log.properties.clear();
        log.searches = 0;
    }

    fn check(&self, rid: &Rid) -> Result<(), ClientError> {
        if self.failing.contains(rid) {
            Err(ClientError::Server {
                status: 503,
                message: format!("asset {rid} unavailable"),
            })
        } else {
            Ok(())
        }
    }

    /// First page of a reference list, when paging is on.
    fn paged(&self, value: &NativeValue) -> NativeValue {
        match (value, self.list_page_size) {
            (NativeValue::ReferenceList(list), Some(size)) if list.items.len() > size => NativeValue::ReferenceList(
                RefList::partial(list.items[..size].to_vec(), list.items.len() as u64),
            ),
            _ => value.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Query evaluation
    // ------------------------------------------------------------------------

    /// Every value reachable from `asset` along `path`.
    fn resolve(&self, asset: &NativeAsset, path: &[&str]) -> Vec<NativeValue> {
        let Some((head, rest)) = path.split_first() else {
            return Vec::new();
        };
        let value = match *head {
            ID_PROPERTY => Some(NativeValue::Text(asset.id().to_string())),
            NAME => asset.name().map(NativeValue::from),
            MODIFIED_ON => asset.modified_on().map(NativeValue::Timestamp),
            other => asset.property(other).cloned(),
        };
        let Some(value) = value.filter(|v| !v.is_absent()) else {
            return Vec::new();
        };

        if rest.is_empty() {
            return match value {
                NativeValue::ReferenceList(list) if list.is_empty() => Vec::new(),
                value => vec![value],
            };
        }
        value
            .references()
            .into_iter()
            .flat_map(|r| match self.assets.get(&r.id) {
                Some(target) => self.resolve(target, rest),
                // Unindexed target: only what the reference itself carries.
                None if rest == [NAME] => r.name.clone().map(NativeValue::Text).into_iter().collect(),
                None => Vec::new(),
            })
            .collect()
    }

    fn holds(&self, asset: &NativeAsset, condition: &Condition) -> bool {
        let path: Vec<&str> = condition.property.split('.').collect();
        let values = self.resolve(asset, &path);
        let expected = condition.value.as_ref();
        let text = |v: &NativeValue| v.as_search_text();
        let expected_text = expected.and_then(|v| v.as_search_text());

        match condition.operator {
            NativeOperator::IsNull => values.is_empty(),
            NativeOperator::NotNull => !values.is_empty(),
            NativeOperator::Equals => values.iter().any(|v| text(v).is_some() && text(v) == expected_text),
            NativeOperator::NotEquals => !values.iter().any(|v| text(v) == expected_text),
            NativeOperator::Like(form) => match &expected_text {
                Some(pattern) => values
                    .iter()
                    .filter_map(text)
                    .any(|candidate| form.matches(&candidate, pattern)),
                None => false,
            },
            NativeOperator::LessThan => {
                values.iter().any(|v| compare(v, expected) == Some(Ordering::Less))
            }
            NativeOperator::AtLeast => values
                .iter()
                .any(|v| matches!(compare(v, expected), Some(Ordering::Greater | Ordering::Equal))),
        }
    }

    fn satisfies(&self, asset: &NativeAsset, set: &ConditionSet) -> bool {
        if set.is_empty() {
            return true;
        }
        let conditions = set.conditions.iter().map(|c| self.holds(asset, c));
        let nested = set.nested.iter().map(|n| self.satisfies(asset, n));
        match set.combinator {
            Combinator::All => conditions.chain(nested).all(|b| b),
            Combinator::Any => conditions.chain(nested).any(|b| b),
        }
    }
}

fn compare(value: &NativeValue, expected: Option<&NativeValue>) -> Option<Ordering> {
    let expected = expected?;
    match (value, expected) {
        (NativeValue::Timestamp(_), _) | (_, NativeValue::Timestamp(_)) => {
            Some(value.as_timestamp()?.cmp(&expected.as_timestamp()?))
        }
        _ => value.as_float()?.partial_cmp(&expected.as_float()?),
    }
}

impl NativeClient for InMemoryCatalog {
    fn search(&self, query: &NativeQuery, page: PageRequest) -> Result<SearchPage, ClientError> {
        self.log.lock().searches += 1;
        let hits: Vec<NativeRef> = self
            .assets
            .values()
            .filter(|a| query.asset_types.iter().any(|t| t == a.native_type()))
            .filter(|a| self.satisfies(a, &query.conditions))
            .map(NativeAsset::to_ref)
            .collect();

        let total = hits.len();
        let end = (page.offset + page.limit).min(total);
        let items = hits.get(page.offset..end).map(<[NativeRef]>::to_vec).unwrap_or_default();
        let next = (end < total).then_some(PageRequest {
            offset: end,
            limit: page.limit,
        });
        Ok(SearchPage {
            items,
            total: total as u64,
            next,
        })
    }

    fn get_by_id(&self, rid: &Rid) -> Result<Option<NativeAsset>, ClientError> {
        let mut log = self.log.lock();
        *log.get_by_id.entry(rid.clone()).or_default() += 1;
        self.check(rid)?;
        let Some(stored) = self.assets.get(rid) else {
            return Ok(None);
        };

        let mut asset = stored.clone();
        for value in asset.properties.values_mut() {
            *value = self.paged(value);
        }
        let withheld: Vec<String> = log
            .withheld
            .iter()
            .filter(|(id, _)| id == rid)
            .map(|(_, p)| p.clone())
            .collect();
        for property in withheld {
            asset.properties.remove(&property);
            log.withheld.remove(&(rid.clone(), property));
        }
        Ok(Some(asset))
    }

    fn get_property(&self, asset: &NativeRef, name: &str) -> Result<NativeValue, ClientError> {
        *self
            .log
            .lock()
            .properties
            .entry((asset.id.clone(), name.to_string()))
            .or_default() += 1;
        self.check(&asset.id)?;
        let Some(stored) = self.assets.get(&asset.id) else {
            return Ok(NativeValue::Null);
        };
        let value = match name {
            MODIFIED_ON => stored.modified_on().map(NativeValue::Timestamp),
            NAME => stored.name().map(NativeValue::from),
            other => stored.property(other).cloned(),
        };
        Ok(value.map(|v| self.paged(&v)).unwrap_or(NativeValue::Null))
    }

    fn next_page(&self, owner: &NativeRef, property: &str, list: &RefList) -> Result<RefList, ClientError> {
        self.check(&owner.id)?;
        let full = self
            .assets
            .get(&owner.id)
            .and_then(|a| a.property(property))
            .and_then(NativeValue::as_reference_list);
        let Some(full) = full else {
            return Ok(RefList::default());
        };
        let start = list.items.len().min(full.items.len());
        let size = self.list_page_size.unwrap_or(full.items.len());
        let end = (start + size).min(full.items.len());
        Ok(RefList::partial(full.items[start..end].to_vec(), full.items.len() as u64))
    }
}
