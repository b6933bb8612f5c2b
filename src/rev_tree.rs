//! The revision tree: an in-memory DAG of document revisions with a fixed
//! big-endian raw serialization.
//!
//! Revisions are addressed by their u16 index in the tree's array, exactly
//! as the raw format addresses them. Mutating operations (insert, sort,
//! compact, prune, purge) renumber revisions, so indexes must not be cached
//! across them.
//!
//! The raw form is a sequence of records in descending priority order (the
//! current leaf first) terminated by a 32-bit zero:
//!
//! ```text
//! size:            u32    total bytes of this record
//! parent_index:    u16    0xFFFF = none
//! delta_ref_index: u16    0xFFFF = none
//! flags:           u8     persistent bits plus presence bits
//! rev_id_len:      u8     1-255
//! rev_id:          bytes
//! sequence:        varint
//! body:            bytes  (if HasData) or varint offset (if HasBodyOffset)
//! ```

use std::cmp::Ordering;

use byteorder::{BigEndian, ByteOrder};

use crate::delta;
use crate::error::{Error, Result};
use crate::revid::RevId;
use crate::varint;
use crate::MAX_REVS;

/// Reserved index value meaning "no revision".
pub const NO_PARENT: u16 = u16::MAX;

// Fixed bytes of a raw record before the rev id.
const RAW_HEADER_SIZE: usize = 10;

mod flags {
    pub const LEAF: u8 = 0x01;
    pub const DELETED: u8 = 0x02;
    pub const HAS_ATTACHMENTS: u8 = 0x04;
    pub const NEW: u8 = 0x08;
    // Raw-format-only presence bits:
    pub const HAS_BODY_OFFSET: u8 = 0x40;
    pub const HAS_DATA: u8 = 0x80;

    pub const PERSISTENT: u8 = LEAF | DELETED | HAS_ATTACHMENTS;
}

/// Loads revision bodies that live in older versions of the document on
/// disk. Injected wherever delta expansion may need a reference body that
/// is no longer inline; a `None` return means the body could not be read.
pub trait BodyLoader {
    fn load_body(&self, offset: u64) -> Option<Vec<u8>>;
}

/// The loader for trees whose interesting bodies are all inline.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLoader;

impl BodyLoader for NoLoader {
    fn load_body(&self, _offset: u64) -> Option<Vec<u8>> {
        None
    }
}

/// Protocol-level outcome of an insertion, mirroring HTTP status semantics.
/// These are results for the caller to relay, not errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertStatus {
    /// No-op: the revision already existed, or a deletion was recorded.
    Ok,
    /// The revision was created.
    Created,
    /// The rev id or its generation number is unacceptable.
    BadRequest,
    /// The named parent revision is not in the tree.
    NotFound,
    /// The insertion would create a conflicting branch.
    Conflict,
}

impl InsertStatus {
    /// The numeric HTTP status.
    pub fn code(self) -> u16 {
        match self {
            InsertStatus::Ok => 200,
            InsertStatus::Created => 201,
            InsertStatus::BadRequest => 400,
            InsertStatus::NotFound => 404,
            InsertStatus::Conflict => 409,
        }
    }
}

/// One revision of a document.
#[derive(Clone, Debug)]
pub struct Revision {
    rev_id: RevId,
    sequence: u64,
    body: Vec<u8>,
    old_body_offset: u64,
    parent_index: u16,
    delta_ref_index: u16,
    flags: u8,
}

impl Revision {
    pub fn rev_id(&self) -> &RevId {
        &self.rev_id
    }

    /// Document sequence this revision was saved at; 0 until saved.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The inline body bytes; empty when the body lives elsewhere or is
    /// gone. A compressed revision's inline body is its delta.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// File offset of an older document version that still carries this
    /// revision's body; 0 = none.
    pub fn old_body_offset(&self) -> u64 {
        self.old_body_offset
    }

    pub fn parent_index(&self) -> Option<u16> {
        match self.parent_index {
            NO_PARENT => None,
            i => Some(i),
        }
    }

    /// Index of the revision whose body this one's delta was computed
    /// against, if compressed.
    pub fn delta_ref_index(&self) -> Option<u16> {
        match self.delta_ref_index {
            NO_PARENT => None,
            i => Some(i),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.flags & flags::LEAF != 0
    }

    pub fn is_deleted(&self) -> bool {
        self.flags & flags::DELETED != 0
    }

    pub fn has_attachments(&self) -> bool {
        self.flags & flags::HAS_ATTACHMENTS != 0
    }

    /// True for revisions inserted since the tree was last decoded.
    pub fn is_new(&self) -> bool {
        self.flags & flags::NEW != 0
    }

    /// Leaf and not deleted: a live branch head.
    pub fn is_active(&self) -> bool {
        self.is_leaf() && !self.is_deleted()
    }

    pub fn is_compressed(&self) -> bool {
        self.delta_ref_index != NO_PARENT
    }

    fn size_to_write(&self) -> usize {
        let mut size =
            RAW_HEADER_SIZE + self.rev_id.len() + varint::size_of_uvarint(self.sequence);
        if !self.body.is_empty() {
            size += self.body.len();
        } else if self.old_body_offset > 0 {
            size += varint::size_of_uvarint(self.old_body_offset);
        }
        size
    }

    fn write_raw(&self, buf: &mut Vec<u8>) {
        let size = self.size_to_write();
        buf.extend_from_slice(&(size as u32).to_be_bytes());
        buf.extend_from_slice(&self.parent_index.to_be_bytes());
        buf.extend_from_slice(&self.delta_ref_index.to_be_bytes());
        let mut raw_flags = self.flags & flags::PERSISTENT;
        if !self.body.is_empty() {
            raw_flags |= flags::HAS_DATA;
        } else if self.old_body_offset > 0 {
            raw_flags |= flags::HAS_BODY_OFFSET;
        }
        buf.push(raw_flags);
        buf.push(self.rev_id.len() as u8);
        buf.extend_from_slice(self.rev_id.as_bytes());
        varint::put_uvarint(buf, self.sequence);
        if !self.body.is_empty() {
            buf.extend_from_slice(&self.body);
        } else if self.old_body_offset > 0 {
            varint::put_uvarint(buf, self.old_body_offset);
        }
    }

    fn read_raw(record: &[u8], default_sequence: u64) -> Result<Revision> {
        let parent_index = BigEndian::read_u16(&record[4..6]);
        let delta_ref_index = BigEndian::read_u16(&record[6..8]);
        let raw_flags = record[8];
        let rev_id_len = record[9] as usize;
        if rev_id_len == 0 {
            return Err(Error::InvalidValue("revision id length is zero".into()));
        }
        if record.len() < RAW_HEADER_SIZE + rev_id_len + 1 {
            return Err(Error::CorruptRevisionData("revision id overruns record"));
        }
        let rev_id = RevId::from(&record[RAW_HEADER_SIZE..RAW_HEADER_SIZE + rev_id_len]);
        let mut data = &record[RAW_HEADER_SIZE + rev_id_len..];
        let sequence = varint::get_uvarint(&mut data)
            .ok_or(Error::CorruptRevisionData("bad sequence varint"))?;
        let mut body = Vec::new();
        let mut old_body_offset = 0;
        if raw_flags & flags::HAS_DATA != 0 {
            body = data.to_vec();
        } else if raw_flags & flags::HAS_BODY_OFFSET != 0 {
            old_body_offset = varint::get_uvarint(&mut data)
                .ok_or(Error::CorruptRevisionData("bad body offset varint"))?;
        }
        Ok(Revision {
            rev_id,
            sequence: if sequence == 0 {
                default_sequence
            } else {
                sequence
            },
            body,
            old_body_offset,
            parent_index,
            delta_ref_index,
            flags: raw_flags & flags::PERSISTENT,
        })
    }

    // Priority ordering: lower sorts earlier. Leaf revs go first, then
    // non-deleted revs, then higher rev IDs.
    fn priority_cmp(&self, other: &Revision) -> Ordering {
        other
            .is_leaf()
            .cmp(&self.is_leaf())
            .then(self.is_deleted().cmp(&other.is_deleted()))
            .then_with(|| other.rev_id.cmp(&self.rev_id))
    }
}

/// An in-memory revision tree.
#[derive(Clone, Debug)]
pub struct RevTree {
    revs: Vec<Revision>,
    body_offset: u64,
    sorted: bool,
    changed: bool,
    unknown: bool,
}

impl Default for RevTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RevTree {
    pub fn new() -> Self {
        RevTree {
            revs: Vec::new(),
            body_offset: 0,
            sorted: true,
            changed: false,
            unknown: false,
        }
    }

    /// A placeholder tree for a document whose metadata was read but whose
    /// revisions were not. Revision accessors panic on such a tree.
    pub fn new_unknown() -> Self {
        RevTree {
            unknown: true,
            ..Self::new()
        }
    }

    /// Decode a raw tree. `seq` fills in the sequence of revisions saved
    /// with sequence 0; `doc_offset` is the file position of the document
    /// the tree was read from.
    pub fn decode(raw: &[u8], seq: u64, doc_offset: u64) -> Result<RevTree> {
        let mut revs = Vec::new();
        let mut pos = 0usize;
        loop {
            if raw.len() - pos < 4 {
                return Err(Error::CorruptRevisionData("missing terminator"));
            }
            let size = BigEndian::read_u32(&raw[pos..]) as usize;
            if size == 0 {
                break;
            }
            if size < RAW_HEADER_SIZE + 2 || size > raw.len() - pos {
                return Err(Error::CorruptRevisionData("record size out of range"));
            }
            revs.push(Revision::read_raw(&raw[pos..pos + size], seq)?);
            if revs.len() > MAX_REVS {
                return Err(Error::CorruptRevisionData("too many revisions"));
            }
            pos += size;
        }
        if pos != raw.len() - 4 {
            return Err(Error::CorruptRevisionData("data after terminator"));
        }
        Ok(RevTree {
            revs,
            body_offset: doc_offset,
            sorted: true,
            changed: false,
            unknown: false,
        })
    }

    /// Serialize the tree, sorting it first. The output round-trips through
    /// [`decode`](RevTree::decode) except for in-memory-only state.
    pub fn encode(&mut self) -> Vec<u8> {
        self.sort();
        let total: usize = self.revs.iter().map(Revision::size_to_write).sum::<usize>() + 4;
        let mut buf = Vec::with_capacity(total);
        for rev in &self.revs {
            rev.write_raw(&mut buf);
        }
        buf.extend_from_slice(&0u32.to_be_bytes());
        debug_assert_eq!(buf.len(), total);
        buf
    }

    /// True when only document metadata is known and no revisions were read.
    pub fn is_unknown(&self) -> bool {
        self.unknown
    }

    /// True when the tree has been mutated since decoding.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// File offset of the document this tree belongs to.
    pub fn body_offset(&self) -> u64 {
        self.body_offset
    }

    /// Record the document's file offset once it has been saved.
    pub fn set_body_offset(&mut self, offset: u64) {
        self.body_offset = offset;
    }

    pub fn rev_count(&self) -> usize {
        assert!(!self.unknown);
        self.revs.len()
    }

    pub fn get(&self, index: u16) -> Option<&Revision> {
        assert!(!self.unknown);
        self.revs.get(index as usize)
    }

    pub fn get_by_id(&self, rev_id: &[u8]) -> Option<u16> {
        assert!(!self.unknown);
        self.revs
            .iter()
            .position(|rev| rev.rev_id == *rev_id)
            .map(|i| i as u16)
    }

    pub fn get_by_sequence(&self, seq: u64) -> Option<u16> {
        assert!(!self.unknown);
        self.revs
            .iter()
            .position(|rev| rev.sequence == seq)
            .map(|i| i as u16)
    }

    /// The winning revision, sorting the tree if needed.
    pub fn current(&mut self) -> Option<&Revision> {
        assert!(!self.unknown);
        self.sort();
        self.revs.first()
    }

    /// Indexes of all leaf revisions, one per live branch.
    pub fn current_revisions(&self) -> Vec<u16> {
        assert!(!self.unknown);
        self.revs
            .iter()
            .enumerate()
            .filter(|(_, rev)| rev.is_leaf())
            .map(|(i, _)| i as u16)
            .collect()
    }

    pub fn parent_of(&self, index: u16) -> Option<u16> {
        self.get(index).and_then(Revision::parent_index)
    }

    /// The ancestry of a revision, starting with the revision itself.
    pub fn history_of(&self, index: u16) -> Vec<u16> {
        let mut history = Vec::new();
        let mut cur = Some(index);
        while let Some(i) = cur {
            if history.len() > self.revs.len() {
                break;
            }
            history.push(i);
            cur = self.parent_of(i);
        }
        history
    }

    /// True when more than one branch head is alive.
    pub fn has_conflict(&self) -> bool {
        assert!(!self.unknown);
        if self.revs.len() < 2 {
            false
        } else if self.sorted {
            self.revs[1].is_active()
        } else {
            self.revs.iter().filter(|rev| rev.is_active()).count() > 1
        }
    }

    /// Insert a revision whose parent is named by id. `allow_conflict`
    /// permits growing a second live branch.
    pub fn insert(
        &mut self,
        rev_id: RevId,
        body: &[u8],
        deleted: bool,
        has_attachments: bool,
        parent_rev_id: Option<&[u8]>,
        allow_conflict: bool,
    ) -> (InsertStatus, Option<u16>) {
        let parent = match parent_rev_id {
            Some(id) => match self.get_by_id(id) {
                Some(i) => Some(i),
                None => return (InsertStatus::NotFound, None),
            },
            None => None,
        };
        self.insert_with_parent(rev_id, body, deleted, has_attachments, parent, allow_conflict)
    }

    /// Insert a revision whose parent is named by index.
    pub fn insert_with_parent(
        &mut self,
        rev_id: RevId,
        body: &[u8],
        deleted: bool,
        has_attachments: bool,
        parent: Option<u16>,
        allow_conflict: bool,
    ) -> (InsertStatus, Option<u16>) {
        // Make sure the given rev id is one the raw format can hold:
        if rev_id.generation() == 0 || rev_id.len() > 255 {
            return (InsertStatus::BadRequest, None);
        }
        if self.get_by_id(rev_id.as_bytes()).is_some() {
            return (InsertStatus::Ok, None); // already exists
        }
        let parent_gen = match parent {
            Some(p) => {
                let parent_rev = match self.get(p) {
                    Some(rev) => rev,
                    None => return (InsertStatus::NotFound, None),
                };
                if !allow_conflict && !parent_rev.is_leaf() {
                    return (InsertStatus::Conflict, None);
                }
                parent_rev.rev_id.generation()
            }
            None => {
                if !allow_conflict && !self.revs.is_empty() {
                    return (InsertStatus::Conflict, None);
                }
                0
            }
        };
        // Enforce that the generation number went up by 1 from the parent:
        if rev_id.generation() != parent_gen + 1 {
            return (InsertStatus::BadRequest, None);
        }
        let status = if deleted {
            InsertStatus::Ok
        } else {
            InsertStatus::Created
        };
        let index = self.raw_insert(rev_id, body, parent, deleted, has_attachments);
        (status, Some(index))
    }

    /// Insert a revision along with its ancestry, newest first. Ancestors
    /// already present are left alone; only the newest revision carries the
    /// body. Returns the index into `history` of the common ancestor, or
    /// `None` if the generation numbers don't descend one by one.
    pub fn insert_history(
        &mut self,
        history: &[RevId],
        body: &[u8],
        deleted: bool,
        has_attachments: bool,
    ) -> Option<usize> {
        assert!(!history.is_empty());
        // Find the common ancestor, if any. Along the way, preflight the
        // revision ids:
        let mut last_gen = 0u32;
        let mut parent: Option<u16> = None;
        let mut common = history.len();
        for (i, id) in history.iter().enumerate() {
            let gen = id.generation();
            if last_gen > 0 && gen != last_gen - 1 {
                return None; // generation numbers not in sequence
            }
            last_gen = gen;
            if let Some(existing) = self.get_by_id(id.as_bytes()) {
                parent = Some(existing);
                common = i;
                break;
            }
        }
        if common > 0 {
            // Insert the new revisions in chronological order:
            for i in (1..common).rev() {
                parent = Some(self.raw_insert(history[i].clone(), &[], parent, false, false));
            }
            self.raw_insert(history[0].clone(), body, parent, deleted, has_attachments);
        }
        Some(common)
    }

    // Lowest-level insert. Does no sanity checking, always inserts.
    fn raw_insert(
        &mut self,
        rev_id: RevId,
        body: &[u8],
        parent: Option<u16>,
        deleted: bool,
        has_attachments: bool,
    ) -> u16 {
        assert!(!self.unknown);
        assert!(self.revs.len() < MAX_REVS);
        let mut rev_flags = flags::LEAF | flags::NEW;
        if deleted {
            rev_flags |= flags::DELETED;
        }
        if has_attachments {
            rev_flags |= flags::HAS_ATTACHMENTS;
        }
        let parent_index = match parent {
            Some(p) => {
                self.revs[p as usize].flags &= !flags::LEAF;
                p
            }
            None => NO_PARENT,
        };
        self.revs.push(Revision {
            rev_id,
            sequence: 0,    // unknown till the doc is saved
            body: body.to_vec(),
            old_body_offset: 0,
            parent_index,
            delta_ref_index: NO_PARENT,
            flags: rev_flags,
        });
        self.changed = true;
        if self.revs.len() > 1 {
            self.sorted = false;
        }
        (self.revs.len() - 1) as u16
    }

    /// Whether the revision's body can be produced without touching disk.
    pub fn is_body_available(&self, index: u16) -> bool {
        !self.revs[index as usize].body.is_empty()
    }

    /// The revision's body, expanding delta compression as needed. Delta
    /// references whose bodies are no longer inline are read through
    /// `loader`.
    pub fn read_body(&self, index: u16, loader: &dyn BodyLoader) -> Result<Vec<u8>> {
        self.read_body_bounded(index, loader, self.revs.len())
    }

    fn read_body_bounded(
        &self,
        index: u16,
        loader: &dyn BodyLoader,
        fuel: usize,
    ) -> Result<Vec<u8>> {
        if fuel == 0 {
            return Err(Error::DeltaFailure(
                "delta reference chain does not terminate".into(),
            ));
        }
        let rev = &self.revs[index as usize];
        if rev.body.is_empty() {
            return Ok(Vec::new());
        }
        if !rev.is_compressed() {
            return Ok(rev.body.clone());
        }
        let reference = &self.revs[rev.delta_ref_index as usize];
        let reference_body = if !reference.body.is_empty() {
            self.read_body_bounded(rev.delta_ref_index, loader, fuel - 1)?
        } else if reference.old_body_offset > 0 {
            loader
                .load_body(reference.old_body_offset)
                .ok_or_else(|| Error::DeltaFailure("failed to load delta reference body".into()))?
        } else {
            return Err(Error::DeltaFailure("delta reference body unavailable".into()));
        };
        delta::apply_delta(&reference_body, &rev.body)
    }

    /// Replace `target`'s body with a delta against `reference`'s body.
    /// Refuses to create a cycle of delta references.
    pub fn compress(
        &mut self,
        target: u16,
        reference: u16,
        loader: &dyn BodyLoader,
    ) -> Result<()> {
        if self.revs[target as usize].is_compressed() {
            return Ok(());
        }
        // Make sure there won't be a cycle:
        let mut link = Some(reference);
        while let Some(i) = link {
            if i == target {
                return Err(Error::CycleAttempted);
            }
            link = self.revs[i as usize].delta_ref_index();
        }
        let target_body = self.read_body(target, loader)?;
        let reference_body = self.read_body(reference, loader)?;
        if target_body.is_empty() || reference_body.is_empty() {
            return Err(Error::DeltaFailure("body unavailable for delta".into()));
        }
        let new_body = delta::create_delta(&reference_body, &target_body)?;
        self.replace_body(target, new_body);
        self.revs[target as usize].delta_ref_index = reference;
        Ok(())
    }

    /// If the revision's body is a delta, expand it and store the expanded
    /// body.
    pub fn decompress(&mut self, index: u16, loader: &dyn BodyLoader) -> Result<()> {
        if !self.revs[index as usize].is_compressed() {
            return Ok(());
        }
        let body = self.read_body(index, loader)?;
        if body.is_empty() {
            return Err(Error::DeltaFailure("expanded body unavailable".into()));
        }
        self.replace_body(index, body);
        self.revs[index as usize].delta_ref_index = NO_PARENT;
        Ok(())
    }

    /// Drop the revision's inline body, remembering where an on-disk copy
    /// can be found. Revisions delta-compressed against it are expanded
    /// first; if `allow_expansion` is false and any exist, nothing happens
    /// and `false` is returned.
    pub fn remove_body(
        &mut self,
        index: u16,
        allow_expansion: bool,
        loader: &dyn BodyLoader,
    ) -> bool {
        if self.revs[index as usize].body.is_empty() {
            return true;
        }
        for i in 0..self.revs.len() {
            if self.revs[i].delta_ref_index == index {
                if !allow_expansion || self.decompress(i as u16, loader).is_err() {
                    return false;
                }
            }
        }
        self.replace_body(index, Vec::new());
        true
    }

    // Low-level body swap. Clearing a body records where the old one lives
    // on disk; setting one clears any stale offset.
    fn replace_body(&mut self, index: u16, body: Vec<u8>) {
        let body_offset = self.body_offset;
        let rev = &mut self.revs[index as usize];
        if body.is_empty() {
            if rev.body.is_empty() {
                return;
            }
            assert!(body_offset > 0);
            rev.old_body_offset = body_offset;
        } else {
            rev.old_body_offset = 0;
        }
        rev.body = body;
        self.changed = true;
    }

    // Marks a revision as a leaf, and returns true, if no revs point to it
    // as their parent.
    fn confirm_leaf(&mut self, index: u16) -> bool {
        for rev in &self.revs {
            if rev.parent_index == index {
                return false;
            }
        }
        self.revs[index as usize].flags |= flags::LEAF;
        true
    }

    /// Per-revision distance from a leaf, walking parent chains. Branch
    /// points have ambiguous depth: `use_max` counts the longest path to a
    /// leaf, otherwise the shortest. Unreachable revisions stay at
    /// `u16::MAX`.
    pub fn compute_depths(&self, use_max: bool) -> Vec<u16> {
        let mut depths = vec![u16::MAX; self.revs.len()];
        for (i, rev) in self.revs.iter().enumerate() {
            if rev.is_leaf() {
                // Walk the ancestry from the leaf, assigning consecutive
                // depths until a better path has already been recorded:
                let mut d: u16 = 0;
                let mut index = i;
                for _ in 0..=self.revs.len() {
                    let old = depths[index];
                    if old == u16::MAX || (use_max && d > old) || (!use_max && d < old) {
                        depths[index] = d;
                    } else {
                        break;
                    }
                    match self.revs[index].parent_index {
                        NO_PARENT => break,
                        p => {
                            index = p as usize;
                            d += 1;
                        }
                    }
                }
            } else if self.sorted {
                // All leaves come first in a sorted tree.
                break;
            }
        }
        depths
    }

    /// Remove every revision more than `max_depth` steps from a leaf.
    /// Returns the number removed.
    pub fn prune(&mut self, max_depth: u16) -> usize {
        if max_depth == 0 || self.revs.len() <= max_depth as usize {
            return 0;
        }
        let depths = self.compute_depths(true);
        let mut pruned = 0;
        for (i, depth) in depths.iter().enumerate() {
            if *depth > max_depth {
                self.revs[i].rev_id = RevId::default();
                pruned += 1;
            }
        }
        if pruned > 0 {
            self.compact();
        }
        pruned
    }

    /// Remove the leaf named by `leaf_id` and every ancestor left childless
    /// by its removal. Returns the number removed; 0 if the id is absent or
    /// not a leaf.
    pub fn purge(&mut self, leaf_id: &[u8]) -> usize {
        let mut cur = match self.get_by_id(leaf_id) {
            Some(i) if self.revs[i as usize].is_leaf() => i,
            _ => return 0,
        };
        let mut purged = 0;
        loop {
            purged += 1;
            let parent = self.revs[cur as usize].parent_index;
            self.revs[cur as usize].rev_id = RevId::default(); // mark for purge
            self.revs[cur as usize].parent_index = NO_PARENT; // unlink
            if parent == NO_PARENT || !self.confirm_leaf(parent) {
                break;
            }
            cur = parent;
        }
        self.compact();
        purged
    }

    // Slides surviving revisions (those still carrying a rev id) down over
    // the tombstones and renumbers every index through the move.
    fn compact(&mut self) {
        let mut map = vec![NO_PARENT; self.revs.len()];
        let mut next = 0u16;
        for (i, rev) in self.revs.iter().enumerate() {
            if !rev.rev_id.is_empty() {
                map[i] = next;
                next += 1;
            }
        }
        for rev in &mut self.revs {
            if rev.rev_id.is_empty() {
                continue;
            }
            if rev.parent_index != NO_PARENT {
                rev.parent_index = map[rev.parent_index as usize];
            }
            if rev.delta_ref_index != NO_PARENT {
                rev.delta_ref_index = map[rev.delta_ref_index as usize];
            }
        }
        self.revs.retain(|rev| !rev.rev_id.is_empty());
        self.changed = true;
    }

    /// Sort revisions into descending priority, the current leaf first,
    /// renumbering parent and delta-reference indexes through the
    /// permutation.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        let n = self.revs.len();
        // old_parents maps pre-sort index to the original parent_index. At
        // the same time each parent_index becomes its own index, so the
        // permutation the sort applies can be read back afterwards.
        let mut old_parents = vec![0u16; n];
        for (i, rev) in self.revs.iter_mut().enumerate() {
            old_parents[i] = rev.parent_index;
            rev.parent_index = i as u16;
        }

        self.revs.sort_by(Revision::priority_cmp);

        // old_to_new maps pre-sort indexes to sorted ones.
        let mut old_to_new = vec![0u16; n];
        for (i, rev) in self.revs.iter().enumerate() {
            old_to_new[rev.parent_index as usize] = i as u16;
        }

        for rev in &mut self.revs {
            let old_index = rev.parent_index as usize;
            let parent = old_parents[old_index];
            rev.parent_index = if parent == NO_PARENT {
                NO_PARENT
            } else {
                old_to_new[parent as usize]
            };
            if rev.delta_ref_index != NO_PARENT {
                rev.delta_ref_index = old_to_new[rev.delta_ref_index as usize];
            }
        }
        self.sorted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn insert(
        tree: &mut RevTree,
        id: &str,
        body: &[u8],
        parent: Option<&str>,
        allow_conflict: bool,
    ) -> (InsertStatus, Option<u16>) {
        tree.insert(
            RevId::from(id),
            body,
            false,
            false,
            parent.map(str::as_bytes),
            allow_conflict,
        )
    }

    fn chain(bodies: [&[u8]; 3]) -> RevTree {
        let mut tree = RevTree::new();
        assert_eq!(
            insert(&mut tree, "1-a", bodies[0], None, false).0,
            InsertStatus::Created
        );
        assert_eq!(
            insert(&mut tree, "2-b", bodies[1], Some("1-a"), false).0,
            InsertStatus::Created
        );
        assert_eq!(
            insert(&mut tree, "3-c", bodies[2], Some("2-b"), false).0,
            InsertStatus::Created
        );
        tree
    }

    struct MapLoader(HashMap<u64, Vec<u8>>);

    impl BodyLoader for MapLoader {
        fn load_body(&self, offset: u64) -> Option<Vec<u8>> {
            self.0.get(&offset).cloned()
        }
    }

    mod insertion {
        use super::*;

        #[test]
        fn linear_inserts() {
            let mut tree = RevTree::new();
            let (status, index) = insert(&mut tree, "1-a", b"{}", None, false);
            assert_eq!(status, InsertStatus::Created);
            assert_eq!(status.code(), 201);
            assert_eq!(index, Some(0));
            let (status, _) = insert(&mut tree, "2-b", b"{}", Some("1-a"), false);
            assert_eq!(status, InsertStatus::Created);
            assert_eq!(tree.rev_count(), 2);
            assert_eq!(tree.current().unwrap().rev_id(), &RevId::from("2-b"));
            assert!(!tree.has_conflict());
        }

        #[test]
        fn duplicate_is_a_noop() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            let (status, index) = insert(&mut tree, "1-a", b"{}", None, false);
            assert_eq!(status, InsertStatus::Ok);
            assert_eq!(index, None);
            assert_eq!(tree.rev_count(), 1);
        }

        #[test]
        fn bad_rev_ids() {
            let mut tree = RevTree::new();
            assert_eq!(
                insert(&mut tree, "nope", b"", None, false).0,
                InsertStatus::BadRequest
            );
            assert_eq!(
                insert(&mut tree, "0-zero", b"", None, false).0,
                InsertStatus::BadRequest
            );
        }

        #[test]
        fn generation_must_step_by_one() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            assert_eq!(
                insert(&mut tree, "3-c", b"{}", Some("1-a"), false).0,
                InsertStatus::BadRequest
            );
            assert_eq!(
                insert(&mut tree, "2-b", b"{}", None, true).0,
                InsertStatus::BadRequest
            );
        }

        #[test]
        fn missing_parent() {
            let mut tree = RevTree::new();
            assert_eq!(
                insert(&mut tree, "2-b", b"{}", Some("1-a"), false).0,
                InsertStatus::NotFound
            );
        }

        #[test]
        fn conflict_refused() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            assert_eq!(
                insert(&mut tree, "1-b", b"{}", None, false).0,
                InsertStatus::Conflict
            );
        }

        #[test]
        fn conflict_via_non_leaf_parent_refused() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            insert(&mut tree, "2-b", b"{}", Some("1-a"), false);
            assert_eq!(
                insert(&mut tree, "2-x", b"{}", Some("1-a"), false).0,
                InsertStatus::Conflict
            );
        }

        #[test]
        fn allowed_conflict_and_winner() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            insert(&mut tree, "2-b", b"{}", Some("1-a"), false);
            let (status, _) = insert(&mut tree, "2-c", b"{}", Some("1-a"), true);
            assert_eq!(status, InsertStatus::Created);
            assert!(tree.has_conflict());
            // The larger rev id wins.
            assert_eq!(tree.current().unwrap().rev_id(), &RevId::from("2-c"));
            assert!(tree.has_conflict(), "sorting must not lose the conflict");
        }

        #[test]
        fn deletion_reports_ok() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            let (status, index) = tree.insert(
                RevId::from("2-b"),
                b"",
                true,
                false,
                Some(b"1-a"),
                false,
            );
            assert_eq!(status, InsertStatus::Ok);
            assert_eq!(status.code(), 200);
            let index = index.unwrap();
            assert!(tree.get(index).unwrap().is_deleted());
            assert!(!tree.has_conflict());
        }

        #[test]
        fn parent_loses_leaf_flag() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            insert(&mut tree, "2-b", b"{}", Some("1-a"), false);
            let parent = tree.get_by_id(b"1-a").unwrap();
            assert!(!tree.get(parent).unwrap().is_leaf());
            assert!(tree.get(parent).unwrap().is_new());
            assert_eq!(tree.current_revisions().len(), 1);
        }

        #[test]
        fn history_onto_existing_ancestor() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"first", None, false);
            let history = [RevId::from("3-c"), RevId::from("2-b"), RevId::from("1-a")];
            let common = tree.insert_history(&history, b"third", false, false);
            assert_eq!(common, Some(2));
            assert_eq!(tree.rev_count(), 3);

            let r1 = tree.get_by_id(b"1-a").unwrap();
            let r2 = tree.get_by_id(b"2-b").unwrap();
            let r3 = tree.get_by_id(b"3-c").unwrap();
            assert_eq!(tree.get(r2).unwrap().parent_index(), Some(r1));
            assert_eq!(tree.get(r3).unwrap().parent_index(), Some(r2));
            assert!(tree.get(r2).unwrap().body().is_empty());
            assert_eq!(tree.get(r3).unwrap().body(), b"third");
            assert_eq!(tree.current().unwrap().rev_id(), &RevId::from("3-c"));
        }

        #[test]
        fn history_with_no_common_ancestor() {
            let mut tree = RevTree::new();
            let history = [RevId::from("2-b"), RevId::from("1-a")];
            assert_eq!(
                tree.insert_history(&history, b"body", false, false),
                Some(2)
            );
            assert_eq!(tree.rev_count(), 2);
            let r2 = tree.get_by_id(b"2-b").unwrap();
            assert_eq!(tree.get(r2).unwrap().body(), b"body");
        }

        #[test]
        fn history_generation_gap() {
            let mut tree = RevTree::new();
            let history = [RevId::from("3-c"), RevId::from("1-a")];
            assert_eq!(tree.insert_history(&history, b"body", false, false), None);
            assert_eq!(tree.rev_count(), 0);
        }

        #[test]
        fn history_head_already_present() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            let history = [RevId::from("1-a")];
            assert_eq!(tree.insert_history(&history, b"body", false, false), Some(0));
            assert_eq!(tree.rev_count(), 1);
        }
    }

    mod sorting {
        use super::*;

        #[test]
        fn parent_indexes_survive_the_permutation() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            insert(&mut tree, "2-b", b"{}", Some("1-a"), false);
            insert(&mut tree, "2-c", b"{}", Some("1-a"), true);
            tree.sort();

            // Active leaves first, larger id winning:
            assert_eq!(tree.get(0).unwrap().rev_id(), &RevId::from("2-c"));
            assert_eq!(tree.get(1).unwrap().rev_id(), &RevId::from("2-b"));
            assert_eq!(tree.get(2).unwrap().rev_id(), &RevId::from("1-a"));
            assert_eq!(tree.get(0).unwrap().parent_index(), Some(2));
            assert_eq!(tree.get(1).unwrap().parent_index(), Some(2));
            assert_eq!(tree.get(2).unwrap().parent_index(), None);
        }

        #[test]
        fn deleted_leaves_sort_after_active_ones() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            insert(&mut tree, "2-b", b"{}", Some("1-a"), false);
            insert(&mut tree, "2-z", b"{}", Some("1-a"), true);
            // Delete the 2-z branch; 2-b should win despite the smaller id.
            tree.insert(RevId::from("3-d"), b"", true, false, Some(b"2-z"), false);
            assert_eq!(tree.current().unwrap().rev_id(), &RevId::from("2-b"));
            assert!(!tree.has_conflict());
        }

        #[test]
        fn sort_is_idempotent() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            insert(&mut tree, "2-b", b"{}", Some("1-a"), false);
            insert(&mut tree, "2-c", b"{}", Some("1-a"), true);
            let once = tree.encode();
            let twice = tree.encode();
            assert_eq!(once, twice);
        }
    }

    mod raw_format {
        use super::*;

        #[test]
        fn single_record_layout() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            let raw = tree.encode();
            let expected = [
                0x00, 0x00, 0x00, 0x10, // size 16
                0xff, 0xff, // no parent
                0xff, 0xff, // no delta ref
                0x81, // Leaf | HasData
                0x03, // rev id length
                b'1', b'-', b'a', // rev id
                0x00, // sequence 0
                b'{', b'}', // body
                0x00, 0x00, 0x00, 0x00, // terminator
            ];
            assert_eq!(raw, expected);
        }

        #[test]
        fn roundtrip_stable_bytes() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{\"v\":1}", None, false);
            insert(&mut tree, "2-b", b"{\"v\":2}", Some("1-a"), false);
            insert(&mut tree, "2-c", b"{\"v\":3}", Some("1-a"), true);
            tree.insert(RevId::from("3-d"), b"", true, false, Some(b"2-c"), false);
            let raw = tree.encode();
            // Unsaved revisions carry sequence 0, so decoding with seq 0
            // keeps the records byte-identical.
            let mut decoded = RevTree::decode(&raw, 0, 99).unwrap();
            assert_eq!(decoded.rev_count(), 4);
            assert_eq!(decoded.body_offset(), 99);
            assert!(!decoded.changed());
            assert_eq!(decoded.encode(), raw);
        }

        #[test]
        fn decoded_state_matches() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"one", None, false);
            insert(&mut tree, "2-b", b"two", Some("1-a"), false);
            let raw = tree.encode();
            let mut decoded = RevTree::decode(&raw, 5, 0).unwrap();

            let r2 = decoded.get_by_id(b"2-b").unwrap();
            let r1 = decoded.get_by_id(b"1-a").unwrap();
            assert!(decoded.get(r2).unwrap().is_leaf());
            assert!(!decoded.get(r2).unwrap().is_new(), "New is in-memory only");
            assert_eq!(decoded.get(r2).unwrap().parent_index(), Some(r1));
            assert_eq!(decoded.get(r2).unwrap().body(), b"two");
            assert_eq!(decoded.get(r2).unwrap().sequence(), 5);
            assert_eq!(decoded.current().unwrap().rev_id(), &RevId::from("2-b"));
        }

        #[test]
        fn empty_tree() {
            let mut tree = RevTree::new();
            let raw = tree.encode();
            assert_eq!(raw, [0x00, 0x00, 0x00, 0x00]);
            let decoded = RevTree::decode(&raw, 0, 0).unwrap();
            assert_eq!(decoded.rev_count(), 0);
        }

        #[test]
        fn body_offset_record() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"gone", None, false);
            tree.set_body_offset(0x1234);
            assert!(tree.remove_body(0, false, &NoLoader));
            let raw = tree.encode();
            let decoded = RevTree::decode(&raw, 0, 0x2000).unwrap();
            let rev = decoded.get(0).unwrap();
            assert!(rev.body().is_empty());
            assert_eq!(rev.old_body_offset(), 0x1234);
        }

        #[test]
        fn corrupt_truncations() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            let raw = tree.encode();

            // Drop the terminator.
            let err = RevTree::decode(&raw[..raw.len() - 4], 0, 0).unwrap_err();
            assert!(matches!(err, Error::CorruptRevisionData(_)));

            // Truncate mid-record.
            let err = RevTree::decode(&raw[..6], 0, 0).unwrap_err();
            assert!(matches!(err, Error::CorruptRevisionData(_)));

            // Trailing garbage after the terminator.
            let mut long = raw.clone();
            long.push(0xab);
            let err = RevTree::decode(&long, 0, 0).unwrap_err();
            assert!(matches!(err, Error::CorruptRevisionData(_)));

            // Empty buffer has no terminator.
            let err = RevTree::decode(&[], 0, 0).unwrap_err();
            assert!(matches!(err, Error::CorruptRevisionData(_)));
        }

        #[test]
        fn corrupt_record_size() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            let mut raw = tree.encode();
            // Inflate the record size past the buffer.
            raw[3] = 0xf0;
            let err = RevTree::decode(&raw, 0, 0).unwrap_err();
            assert!(matches!(err, Error::CorruptRevisionData(_)));
        }

        #[test]
        fn zero_length_rev_id() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            let mut raw = tree.encode();
            raw[9] = 0;
            let err = RevTree::decode(&raw, 0, 0).unwrap_err();
            assert!(matches!(err, Error::InvalidValue(_)));
        }
    }

    mod bodies {
        use super::*;

        #[test]
        fn compress_and_expand() {
            let body2: &[u8] = br#"{"name":"doc","count":2}"#;
            let body3: &[u8] = br#"{"name":"doc","count":3}"#;
            let mut tree = chain([br#"{"name":"doc","count":1}"#, body2, body3]);
            let r2 = tree.get_by_id(b"2-b").unwrap();
            let r3 = tree.get_by_id(b"3-c").unwrap();

            tree.compress(r3, r2, &NoLoader).unwrap();
            assert!(tree.get(r3).unwrap().is_compressed());
            assert_eq!(tree.get(r3).unwrap().delta_ref_index(), Some(r2));
            assert_ne!(tree.get(r3).unwrap().body(), body3);
            assert_eq!(tree.read_body(r3, &NoLoader).unwrap(), body3);

            tree.decompress(r3, &NoLoader).unwrap();
            assert!(!tree.get(r3).unwrap().is_compressed());
            assert_eq!(tree.get(r3).unwrap().body(), body3);
        }

        #[test]
        fn compression_cycle_refused() {
            let mut tree = chain([b"{\"n\":1}", b"{\"n\":2}", b"{\"n\":3}"]);
            let r2 = tree.get_by_id(b"2-b").unwrap();
            let r3 = tree.get_by_id(b"3-c").unwrap();
            tree.compress(r3, r2, &NoLoader).unwrap();
            assert_eq!(
                tree.compress(r2, r3, &NoLoader),
                Err(Error::CycleAttempted)
            );
            // Self-reference is a cycle of length one.
            let r1 = tree.get_by_id(b"1-a").unwrap();
            assert_eq!(
                tree.compress(r1, r1, &NoLoader),
                Err(Error::CycleAttempted)
            );
        }

        #[test]
        fn compress_is_idempotent() {
            let mut tree = chain([b"{\"n\":1}", b"{\"n\":2}", b"{\"n\":3}"]);
            let r2 = tree.get_by_id(b"2-b").unwrap();
            let r3 = tree.get_by_id(b"3-c").unwrap();
            tree.compress(r3, r2, &NoLoader).unwrap();
            let delta = tree.get(r3).unwrap().body().to_vec();
            tree.compress(r3, r2, &NoLoader).unwrap();
            assert_eq!(tree.get(r3).unwrap().body(), delta);
        }

        #[test]
        fn chained_deltas_expand() {
            let body1: &[u8] = br#"{"tag":"a","v":1}"#;
            let body2: &[u8] = br#"{"tag":"a","v":2}"#;
            let body3: &[u8] = br#"{"tag":"a","v":3}"#;
            let mut tree = chain([body1, body2, body3]);
            let r1 = tree.get_by_id(b"1-a").unwrap();
            let r2 = tree.get_by_id(b"2-b").unwrap();
            let r3 = tree.get_by_id(b"3-c").unwrap();
            tree.compress(r3, r2, &NoLoader).unwrap();
            tree.compress(r2, r1, &NoLoader).unwrap();
            assert_eq!(tree.read_body(r3, &NoLoader).unwrap(), body3);
            assert_eq!(tree.read_body(r2, &NoLoader).unwrap(), body2);
        }

        #[test]
        fn remove_body_guards_dependents() {
            let body3: &[u8] = b"{\"n\":3}";
            let mut tree = chain([b"{\"n\":1}", b"{\"n\":2}", body3]);
            tree.set_body_offset(50);
            let r2 = tree.get_by_id(b"2-b").unwrap();
            let r3 = tree.get_by_id(b"3-c").unwrap();
            tree.compress(r3, r2, &NoLoader).unwrap();

            assert!(!tree.remove_body(r2, false, &NoLoader));
            assert!(tree.get(r2).unwrap().body().len() > 0);

            assert!(tree.remove_body(r2, true, &NoLoader));
            assert!(tree.get(r2).unwrap().body().is_empty());
            assert_eq!(tree.get(r2).unwrap().old_body_offset(), 50);
            // The dependent was expanded first.
            assert!(!tree.get(r3).unwrap().is_compressed());
            assert_eq!(tree.get(r3).unwrap().body(), body3);
        }

        #[test]
        fn reference_body_loaded_from_disk() {
            let reference_body = br#"{"state":"before"}"#.to_vec();
            let target_body = br#"{"state":"after"}"#.to_vec();
            let delta_bytes = crate::delta::create_delta(&reference_body, &target_body).unwrap();

            // Hand-build a raw tree: the leaf holds a delta, its reference
            // body lives at offset 42 on disk.
            let mut raw = Vec::new();
            let leaf = Revision {
                rev_id: RevId::from("2-b"),
                sequence: 2,
                body: delta_bytes,
                old_body_offset: 0,
                parent_index: 1,
                delta_ref_index: 1,
                flags: flags::LEAF,
            };
            let root = Revision {
                rev_id: RevId::from("1-a"),
                sequence: 1,
                body: Vec::new(),
                old_body_offset: 42,
                parent_index: NO_PARENT,
                delta_ref_index: NO_PARENT,
                flags: 0,
            };
            leaf.write_raw(&mut raw);
            root.write_raw(&mut raw);
            raw.extend_from_slice(&0u32.to_be_bytes());

            let tree = RevTree::decode(&raw, 0, 0).unwrap();
            let mut bodies = HashMap::new();
            bodies.insert(42u64, reference_body);
            let loader = MapLoader(bodies);
            assert_eq!(tree.read_body(0, &loader).unwrap(), target_body);

            // Without the on-disk body the expansion fails.
            let err = tree.read_body(0, &NoLoader).unwrap_err();
            assert!(matches!(err, Error::DeltaFailure(_)));
        }

        #[test]
        fn read_body_plain() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"inline", None, false);
            assert!(tree.is_body_available(0));
            assert_eq!(tree.read_body(0, &NoLoader).unwrap(), b"inline");
        }
    }

    mod pruning {
        use super::*;

        #[test]
        fn prune_chain_to_depth() {
            let mut tree = chain([b"{\"n\":1}", b"{\"n\":2}", b"{\"n\":3}"]);
            assert_eq!(tree.prune(1), 1);
            assert_eq!(tree.rev_count(), 2);
            assert_eq!(tree.get_by_id(b"1-a"), None);

            let r2 = tree.get_by_id(b"2-b").unwrap();
            let r3 = tree.get_by_id(b"3-c").unwrap();
            assert_eq!(tree.get(r2).unwrap().parent_index(), None);
            assert_eq!(tree.get(r3).unwrap().parent_index(), Some(r2));
        }

        #[test]
        fn prune_noops() {
            let mut tree = chain([b"1", b"2", b"3"]);
            assert_eq!(tree.prune(0), 0);
            assert_eq!(tree.prune(3), 0);
            assert_eq!(tree.rev_count(), 3);
        }

        #[test]
        fn prune_is_idempotent() {
            let mut tree = chain([b"1", b"2", b"3"]);
            assert_eq!(tree.prune(1), 1);
            assert_eq!(tree.prune(1), 0);
            assert_eq!(tree.rev_count(), 2);
        }

        #[test]
        fn purge_chain_removes_ancestry() {
            let mut tree = chain([b"1", b"2", b"3"]);
            assert_eq!(tree.purge(b"3-c"), 3);
            assert_eq!(tree.rev_count(), 0);
        }

        #[test]
        fn purge_stops_at_shared_ancestor() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            insert(&mut tree, "2-b", b"{}", Some("1-a"), false);
            insert(&mut tree, "2-c", b"{}", Some("1-a"), true);
            assert_eq!(tree.purge(b"2-c"), 1);
            assert_eq!(tree.rev_count(), 2);

            let r1 = tree.get_by_id(b"1-a").unwrap();
            let r2 = tree.get_by_id(b"2-b").unwrap();
            assert_eq!(tree.get(r2).unwrap().parent_index(), Some(r1));
            assert!(!tree.get(r1).unwrap().is_leaf(), "2-b still descends from it");
        }

        #[test]
        fn purge_non_leaf_is_refused() {
            let mut tree = chain([b"1", b"2", b"3"]);
            assert_eq!(tree.purge(b"1-a"), 0);
            assert_eq!(tree.purge(b"9-missing"), 0);
            assert_eq!(tree.rev_count(), 3);
        }

        #[test]
        fn depths_longest_and_shortest() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            insert(&mut tree, "2-b", b"{}", Some("1-a"), false);
            insert(&mut tree, "3-c", b"{}", Some("2-b"), false);
            insert(&mut tree, "2-d", b"{}", Some("1-a"), true);

            let r1 = tree.get_by_id(b"1-a").unwrap() as usize;
            let longest = tree.compute_depths(true);
            assert_eq!(longest[r1], 2);
            let shortest = tree.compute_depths(false);
            assert_eq!(shortest[r1], 1);
        }
    }

    mod accessors {
        use super::*;

        #[test]
        fn lookup_by_sequence() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"one", None, false);
            let raw = tree.encode();
            let decoded = RevTree::decode(&raw, 9, 0).unwrap();
            assert_eq!(decoded.get_by_sequence(9), Some(0));
            assert_eq!(decoded.get_by_sequence(10), None);
        }

        #[test]
        fn conflict_counting_unsorted() {
            let mut tree = RevTree::new();
            insert(&mut tree, "1-a", b"{}", None, false);
            insert(&mut tree, "2-b", b"{}", Some("1-a"), false);
            assert!(!tree.has_conflict());
            insert(&mut tree, "2-c", b"{}", Some("1-a"), true);
            assert!(tree.has_conflict());
        }

        #[test]
        fn history_walk() {
            let tree = chain([b"1", b"2", b"3"]);
            let r3 = tree.get_by_id(b"3-c").unwrap();
            let history = tree.history_of(r3);
            let ids: Vec<_> = history
                .iter()
                .map(|&i| tree.get(i).unwrap().rev_id().clone())
                .collect();
            assert_eq!(
                ids,
                vec![RevId::from("3-c"), RevId::from("2-b"), RevId::from("1-a")]
            );
        }

        #[test]
        fn change_tracking() {
            let mut tree = RevTree::new();
            assert!(!tree.changed());
            insert(&mut tree, "1-a", b"{}", None, false);
            assert!(tree.changed());
        }

        #[test]
        #[should_panic]
        fn unknown_tree_asserts() {
            let tree = RevTree::new_unknown();
            assert!(tree.is_unknown());
            tree.rev_count();
        }
    }
}
