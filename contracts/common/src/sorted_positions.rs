//! Ordered Position Index
//!
//! Doubly linked list of active positions ordered by decreasing nominal
//! collateral ratio (NICR). The head is the best collateralized position,
//! the tail the riskiest. `next` walks towards the tail, `prev` towards the
//! head.
//!
//! Keys are not stored in the nodes. Every comparison asks a
//! [`NominalRatioSource`] for the neighbour's current NICR, so the order
//! stays correct while positions accrue pending rewards. Insert hints are
//! advisory: a hint that no longer brackets the key is discarded and the
//! position is located by walking the list from whatever part of the hint
//! is still usable.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{XusdError, XusdResult};
use crate::types::Address;
use crate::{BTreeMap, Vec};

/// Provides the current nominal ratio of an indexed id
pub trait NominalRatioSource {
    fn nominal_icr(&self, id: &Address) -> XusdResult<u128>;
}

/// Neighbour links of one index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Node {
    /// Neighbour with the next higher NICR
    pub prev: Option<Address>,
    /// Neighbour with the next lower NICR
    pub next: Option<Address>,
}

/// Sorted position list for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct SortedPositions {
    /// Head of the list (highest NICR)
    head: Option<Address>,
    /// Tail of the list (lowest NICR)
    tail: Option<Address>,
    /// Number of positions in the list
    size: u64,
    /// Capacity, `u64::MAX` for unbounded
    max_size: u64,
    nodes: BTreeMap<Address, Node>,
}

impl Default for SortedPositions {
    fn default() -> Self {
        Self::new(u64::MAX)
    }
}

impl SortedPositions {
    /// Create a new empty sorted list
    pub fn new(max_size: u64) -> Self {
        Self {
            head: None,
            tail: None,
            size: 0,
            max_size,
            nodes: BTreeMap::new(),
        }
    }

    pub fn contains(&self, id: &Address) -> bool {
        self.nodes.contains_key(id)
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_full(&self) -> bool {
        self.size == self.max_size
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Highest NICR position
    pub fn first(&self) -> Option<Address> {
        self.head
    }

    /// Lowest NICR position
    pub fn last(&self) -> Option<Address> {
        self.tail
    }

    /// Neighbour with the next lower NICR
    pub fn next(&self, id: &Address) -> Option<Address> {
        self.nodes.get(id).and_then(|n| n.next)
    }

    /// Neighbour with the next higher NICR
    pub fn prev(&self, id: &Address) -> Option<Address> {
        self.nodes.get(id).and_then(|n| n.prev)
    }

    /// Ids from head to tail
    pub fn iter(&self) -> impl Iterator<Item = Address> + '_ {
        core::iter::successors(self.head, move |id| self.next(id))
    }

    /// Ids from tail to head
    pub fn iter_rev(&self) -> impl Iterator<Item = Address> + '_ {
        core::iter::successors(self.tail, move |id| self.prev(id))
    }

    /// Collect ids from head to tail
    pub fn to_vec(&self) -> Vec<Address> {
        self.iter().collect()
    }

    // ============ Mutation ============

    /// Insert `id` with key `nicr`, using `(prev_hint, next_hint)` when they still bracket it
    pub fn insert<S: NominalRatioSource + ?Sized>(
        &mut self,
        id: Address,
        nicr: u128,
        prev_hint: Option<Address>,
        next_hint: Option<Address>,
        source: &S,
    ) -> XusdResult<()> {
        if self.is_full() {
            return Err(XusdError::IndexFull);
        }
        if self.contains(&id) {
            return Err(XusdError::AlreadyInIndex { id });
        }
        if nicr == 0 {
            return Err(XusdError::InvalidNominalIcr);
        }

        let (prev, next) = if self.valid_insert_position(nicr, prev_hint, next_hint, source)? {
            (prev_hint, next_hint)
        } else {
            tracing::trace!("stale index hint, searching insert position");
            self.find_insert_position(nicr, prev_hint, next_hint, source)?
        };

        match (prev, next) {
            (None, None) => {
                self.head = Some(id);
                self.tail = Some(id);
            }
            (None, Some(next_id)) => {
                self.node_mut(&next_id)?.prev = Some(id);
                self.head = Some(id);
            }
            (Some(prev_id), None) => {
                self.node_mut(&prev_id)?.next = Some(id);
                self.tail = Some(id);
            }
            (Some(prev_id), Some(next_id)) => {
                self.node_mut(&prev_id)?.next = Some(id);
                self.node_mut(&next_id)?.prev = Some(id);
            }
        }

        self.nodes.insert(id, Node { prev, next });
        self.size += 1;
        Ok(())
    }

    /// Unlink `id` from the list
    pub fn remove(&mut self, id: &Address) -> XusdResult<()> {
        let node = self.nodes.remove(id).ok_or(XusdError::NotInIndex { id: *id })?;

        match node.prev {
            Some(prev_id) => self.node_mut(&prev_id)?.next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next_id) => self.node_mut(&next_id)?.prev = node.prev,
            None => self.tail = node.prev,
        }

        self.size -= 1;
        Ok(())
    }

    /// Move `id` to the slot matching its new key
    pub fn re_insert<S: NominalRatioSource + ?Sized>(
        &mut self,
        id: Address,
        new_nicr: u128,
        prev_hint: Option<Address>,
        next_hint: Option<Address>,
        source: &S,
    ) -> XusdResult<()> {
        if !self.contains(&id) {
            return Err(XusdError::NotInIndex { id });
        }
        if new_nicr == 0 {
            return Err(XusdError::InvalidNominalIcr);
        }
        self.remove(&id)?;
        self.insert(id, new_nicr, prev_hint, next_hint, source)
    }

    // ============ Positioning ============

    /// Whether `(prev, next)` is exactly the slot where `nicr` belongs
    pub fn valid_insert_position<S: NominalRatioSource + ?Sized>(
        &self,
        nicr: u128,
        prev: Option<Address>,
        next: Option<Address>,
        source: &S,
    ) -> XusdResult<bool> {
        match (prev, next) {
            (None, None) => Ok(self.is_empty()),
            (None, Some(next_id)) => {
                Ok(self.head == Some(next_id) && nicr >= source.nominal_icr(&next_id)?)
            }
            (Some(prev_id), None) => {
                Ok(self.tail == Some(prev_id) && nicr <= source.nominal_icr(&prev_id)?)
            }
            (Some(prev_id), Some(next_id)) => Ok(self.next(&prev_id) == Some(next_id)
                && source.nominal_icr(&prev_id)? >= nicr
                && nicr >= source.nominal_icr(&next_id)?),
        }
    }

    /// Locate the slot for `nicr`, starting from whichever hint is still usable
    pub fn find_insert_position<S: NominalRatioSource + ?Sized>(
        &self,
        nicr: u128,
        prev_hint: Option<Address>,
        next_hint: Option<Address>,
        source: &S,
    ) -> XusdResult<(Option<Address>, Option<Address>)> {
        let mut prev = prev_hint;
        let mut next = next_hint;

        if let Some(prev_id) = prev {
            if !self.contains(&prev_id) || nicr > source.nominal_icr(&prev_id)? {
                // Hint no longer in the list or sits below the key
                prev = None;
            }
        }
        if let Some(next_id) = next {
            if !self.contains(&next_id) || nicr < source.nominal_icr(&next_id)? {
                next = None;
            }
        }

        match (prev, next) {
            (None, None) => match self.head {
                Some(head) => self.descend_list(nicr, head, source),
                None => Ok((None, None)),
            },
            (None, Some(next_id)) => self.ascend_list(nicr, next_id, source),
            (Some(prev_id), _) => self.descend_list(nicr, prev_id, source),
        }
    }

    /// Walk towards the tail from `start` until the slot brackets `nicr`
    fn descend_list<S: NominalRatioSource + ?Sized>(
        &self,
        nicr: u128,
        start: Address,
        source: &S,
    ) -> XusdResult<(Option<Address>, Option<Address>)> {
        if self.head == Some(start) && nicr >= source.nominal_icr(&start)? {
            return Ok((None, Some(start)));
        }

        let mut prev = Some(start);
        let mut next = self.next(&start);
        while prev.is_some() {
            if self.valid_insert_position(nicr, prev, next, source)? {
                break;
            }
            prev = next;
            next = prev.and_then(|p| self.next(&p));
        }
        Ok((prev, next))
    }

    /// Walk towards the head from `start` until the slot brackets `nicr`
    fn ascend_list<S: NominalRatioSource + ?Sized>(
        &self,
        nicr: u128,
        start: Address,
        source: &S,
    ) -> XusdResult<(Option<Address>, Option<Address>)> {
        if self.tail == Some(start) && nicr <= source.nominal_icr(&start)? {
            return Ok((Some(start), None));
        }

        let mut next = Some(start);
        let mut prev = self.prev(&start);
        while next.is_some() {
            if self.valid_insert_position(nicr, prev, next, source)? {
                break;
            }
            next = prev;
            prev = next.and_then(|n| self.prev(&n));
        }
        Ok((prev, next))
    }

    fn node_mut(&mut self, id: &Address) -> XusdResult<&mut Node> {
        self.nodes.get_mut(id).ok_or(XusdError::NotInIndex { id: *id })
    }
}
