//! The VM entity and the ordered VM catalog.
//!
//! A [`VmCatalog`] is a snapshot of the VMs the broker returned for one
//! `list_of_vm` request.  Order is meaningful: the broker lists the
//! preferred desktop first, and index 0 is the default connection candidate.
//!
//! # Storage choice
//!
//! VMs are kept in a `Vec` in broker order (O(1) append while parsing) with an
//! auxiliary `HashMap<VmId, usize>` so that `get(id)` is O(1).  The map also
//! enforces the "ids are unique" invariant at insertion time.

use std::collections::HashMap;
use std::fmt;

/// Broker-assigned identifier of a VM.  Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VmId(u32);

impl VmId {
    /// Returns `None` for `0`, which the broker never assigns.
    pub fn new(raw: u32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One virtual machine session available to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vm {
    pub id: VmId,
    /// Display label.
    pub name: String,
    /// Broker-reported status, e.g. `"running"`, `"stopped"`.
    pub state: String,
    /// `true` if the VM is administratively locked and must not be connected to.
    pub blocked: bool,
}

impl Vm {
    pub fn new(id: VmId, name: impl Into<String>, state: impl Into<String>, blocked: bool) -> Self {
        Self {
            id,
            name: name.into(),
            state: state.into(),
            blocked,
        }
    }
}

/// Ordered, id-unique list of VMs returned by one list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmCatalog {
    vms: Vec<Vm>,
    index: HashMap<VmId, usize>,
}

impl VmCatalog {
    /// Creates an empty catalog (the broker reported zero VMs).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from VMs in broker order.
    ///
    /// # Errors
    ///
    /// Returns the first id that appears more than once.
    pub fn try_from_vms(vms: impl IntoIterator<Item = Vm>) -> Result<Self, VmId> {
        let mut catalog = Self::new();
        for vm in vms {
            catalog.push(vm)?;
        }
        Ok(catalog)
    }

    /// Appends a VM, rejecting a duplicate id.
    pub(crate) fn push(&mut self, vm: Vm) -> Result<(), VmId> {
        if self.index.contains_key(&vm.id) {
            return Err(vm.id);
        }
        self.index.insert(vm.id, self.vms.len());
        self.vms.push(vm);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    /// The default connection candidate: the first VM in broker order.
    pub fn first(&self) -> Option<&Vm> {
        self.vms.first()
    }

    /// Looks a VM up by id.
    pub fn get(&self, id: VmId) -> Option<&Vm> {
        self.index.get(&id).map(|&i| &self.vms[i])
    }

    pub fn contains(&self, id: VmId) -> bool {
        self.index.contains_key(&id)
    }

    /// Iterates in broker order.
    pub fn iter(&self) -> std::slice::Iter<'_, Vm> {
        self.vms.iter()
    }

    pub fn as_slice(&self) -> &[Vm] {
        &self.vms
    }
}

impl<'a> IntoIterator for &'a VmCatalog {
    type Item = &'a Vm;
    type IntoIter = std::slice::Iter<'a, Vm>;

    fn into_iter(self) -> Self::IntoIter {
        self.vms.iter()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
