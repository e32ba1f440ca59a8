//! The component tree and its flattened aggregate view.

use std::cell::OnceCell;
use std::error::Error;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use tickweave_block::UpdateBlock;
use tickweave_core::{BlockId, ComponentId, Constraint};
use tracing::debug;

// ── Errors ──────────────────────────────────────────────────────

/// Errors from editing a [`Hierarchy`].
///
/// Every error is raised by the call that would introduce the defect;
/// the hierarchy is left unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A sibling component with this name already exists.
    DuplicateComponentName {
        /// Path of the parent component.
        parent: String,
        /// The contested name.
        name: String,
    },
    /// The component already owns a block with this name.
    DuplicateBlockName {
        /// Path of the owning component.
        component: String,
        /// The contested name.
        name: String,
    },
    /// The ordered pair is already constrained somewhere in the hierarchy.
    DuplicateConstraint {
        /// Name of the earlier block.
        before: String,
        /// Name of the later block.
        after: String,
        /// Path of the component already holding the constraint.
        owner: String,
    },
    /// A block cannot be ordered against itself.
    SelfConstraint {
        /// Name of the block.
        block: String,
    },
    /// The block id does not name a live block.
    UnknownBlock {
        /// The offending id.
        block: BlockId,
    },
    /// The component id does not name a live component.
    UnknownComponent {
        /// The offending id.
        component: ComponentId,
    },
    /// The top component cannot be removed.
    CannotRemoveRoot,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateComponentName { parent, name } => {
                write!(f, "component '{parent}' already has a child named '{name}'")
            }
            Self::DuplicateBlockName { component, name } => write!(
                f,
                "update block '{name}' already registered in component '{component}'"
            ),
            Self::DuplicateConstraint {
                before,
                after,
                owner,
            } => write!(
                f,
                "constraint '{before}' < '{after}' already declared in '{owner}'"
            ),
            Self::SelfConstraint { block } => {
                write!(f, "update block '{block}' cannot be ordered against itself")
            }
            Self::UnknownBlock { block } => write!(f, "unknown update block #{block}"),
            Self::UnknownComponent { component } => write!(f, "unknown component #{component}"),
            Self::CannotRemoveRoot => write!(f, "the top component cannot be removed"),
        }
    }
}

impl Error for RegistryError {}

// ── Nodes ───────────────────────────────────────────────────────

/// Read-only view of one component node.
#[derive(Debug)]
pub struct Component {
    name: String,
    parent: Option<ComponentId>,
    children: IndexMap<String, ComponentId>,
    blocks: IndexMap<String, BlockId>,
    constraints: IndexSet<Constraint>,
    alive: bool,
}

impl Component {
    fn new(name: String, parent: Option<ComponentId>) -> Self {
        Self {
            name,
            parent,
            children: IndexMap::new(),
            blocks: IndexMap::new(),
            constraints: IndexSet::new(),
            alive: true,
        }
    }

    /// Local name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent component; `None` for the top.
    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    /// Child components in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&str, ComponentId)> + '_ {
        self.children.iter().map(|(n, &c)| (n.as_str(), c))
    }

    /// Locally owned blocks in registration order.
    pub fn blocks(&self) -> impl Iterator<Item = (&str, BlockId)> + '_ {
        self.blocks.iter().map(|(n, &b)| (n.as_str(), b))
    }

    /// Locally declared constraints in declaration order.
    pub fn constraints(&self) -> impl Iterator<Item = Constraint> + '_ {
        self.constraints.iter().copied()
    }
}

#[derive(Debug)]
struct BlockEntry {
    block: UpdateBlock,
    owner: ComponentId,
    alive: bool,
}

/// The flattened, top-level view of a hierarchy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Aggregate {
    /// Every live block, in registration order.
    pub blocks: Vec<BlockId>,
    /// Every live constraint, in declaration order.
    pub constraints: Vec<Constraint>,
    /// Owning component of every live block.
    pub owners: IndexMap<BlockId, ComponentId>,
}

// ── Hierarchy ───────────────────────────────────────────────────

/// An arena-backed component tree owning update blocks and constraints.
///
/// Components, blocks and constraints are added and removed through
/// `&mut self` methods. Every successful structural edit bumps
/// [`revision`](Self::revision) and invalidates the cached
/// [`aggregate`](Self::aggregate).
#[derive(Debug)]
pub struct Hierarchy {
    components: Vec<Component>,
    blocks: Vec<BlockEntry>,
    /// Every live constraint and the component declaring it.
    constraints: IndexMap<Constraint, ComponentId>,
    revision: u64,
    cache: OnceCell<Aggregate>,
}

impl Hierarchy {
    /// Create a hierarchy with a single top component.
    pub fn new(top_name: impl Into<String>) -> Self {
        Self {
            components: vec![Component::new(top_name.into(), None)],
            blocks: Vec::new(),
            constraints: IndexMap::new(),
            revision: 0,
            cache: OnceCell::new(),
        }
    }

    /// Id of the top component.
    pub fn top(&self) -> ComponentId {
        ComponentId(0)
    }

    /// Structural revision. Incremented by every successful edit.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.cache = OnceCell::new();
    }

    fn live(&self, id: ComponentId) -> Result<&Component, RegistryError> {
        self.components
            .get(id.0 as usize)
            .filter(|c| c.alive)
            .ok_or(RegistryError::UnknownComponent { component: id })
    }

    fn live_block(&self, id: BlockId) -> Result<&BlockEntry, RegistryError> {
        self.blocks
            .get(id.0 as usize)
            .filter(|b| b.alive)
            .ok_or(RegistryError::UnknownBlock { block: id })
    }

    /// Look up a live component.
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.live(id).ok()
    }

    /// Dotted path of a live component, e.g. `top.sub.reg`.
    pub fn path_of(&self, id: ComponentId) -> Option<String> {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            let node = self.live(c).ok()?;
            parts.push(node.name.as_str());
            cur = node.parent;
        }
        parts.reverse();
        Some(parts.join("."))
    }

    fn path_or_id(&self, id: ComponentId) -> String {
        self.path_of(id).unwrap_or_else(|| format!("#{id}"))
    }

    /// Add a child component under `parent`.
    pub fn add_component(
        &mut self,
        parent: ComponentId,
        name: impl Into<String>,
    ) -> Result<ComponentId, RegistryError> {
        let name = name.into();
        if self.live(parent)?.children.contains_key(&name) {
            return Err(RegistryError::DuplicateComponentName {
                parent: self.path_or_id(parent),
                name,
            });
        }
        let id = ComponentId(self.components.len() as u32);
        self.components
            .push(Component::new(name.clone(), Some(parent)));
        self.components[parent.0 as usize]
            .children
            .insert(name, id);
        self.touch();
        debug!(component = %id, parent = %parent, "component added");
        Ok(id)
    }

    /// Child of `parent` named `name`.
    pub fn component_by_name(&self, parent: ComponentId, name: &str) -> Option<ComponentId> {
        self.live(parent).ok()?.children.get(name).copied()
    }

    /// Remove a component and its whole subtree.
    ///
    /// Retracts every block in the subtree, every constraint declared in
    /// it, and every constraint elsewhere that references a removed block.
    pub fn remove_component(&mut self, id: ComponentId) -> Result<(), RegistryError> {
        if id == self.top() {
            return Err(RegistryError::CannotRemoveRoot);
        }
        let parent = self.live(id)?.parent;
        let subtree = self.collect_from(id, |_, _| true);

        let mut dead_blocks = IndexSet::new();
        for &c in &subtree {
            let node = &mut self.components[c.0 as usize];
            node.alive = false;
            dead_blocks.extend(node.blocks.values().copied());
        }
        for &b in &dead_blocks {
            self.blocks[b.0 as usize].alive = false;
        }

        let stale: Vec<(Constraint, ComponentId)> = self
            .constraints
            .iter()
            .filter(|&(c, owner)| {
                subtree.contains(owner)
                    || dead_blocks.contains(&c.before)
                    || dead_blocks.contains(&c.after)
            })
            .map(|(&c, &o)| (c, o))
            .collect();
        for (c, owner) in &stale {
            self.constraints.shift_remove(c);
            self.components[owner.0 as usize]
                .constraints
                .shift_remove(c);
        }

        if let Some(p) = parent {
            let name = self.components[id.0 as usize].name.clone();
            self.components[p.0 as usize].children.shift_remove(&name);
        }
        self.touch();
        debug!(
            component = %id,
            components = subtree.len(),
            blocks = dead_blocks.len(),
            constraints = stale.len(),
            "component removed"
        );
        Ok(())
    }

    /// Remove the child of `parent` named `name`, with its subtree.
    pub fn remove_component_by_name(
        &mut self,
        parent: ComponentId,
        name: &str,
    ) -> Result<(), RegistryError> {
        let id = self
            .component_by_name(parent, name)
            .ok_or(RegistryError::UnknownComponent {
                component: parent,
            })?;
        self.remove_component(id)
    }

    /// Register an update block under `component`.
    ///
    /// Block ids are assigned in registration order across the whole
    /// hierarchy and are never reused.
    pub fn register_block(
        &mut self,
        component: ComponentId,
        block: UpdateBlock,
    ) -> Result<BlockId, RegistryError> {
        if self.live(component)?.blocks.contains_key(block.name()) {
            return Err(RegistryError::DuplicateBlockName {
                component: self.path_or_id(component),
                name: block.name().to_string(),
            });
        }
        let id = BlockId(self.blocks.len() as u32);
        self.components[component.0 as usize]
            .blocks
            .insert(block.name().to_string(), id);
        debug!(block = %id, name = block.name(), component = %component, "block registered");
        self.blocks.push(BlockEntry {
            block,
            owner: component,
            alive: true,
        });
        self.touch();
        Ok(id)
    }

    /// Live block by id.
    pub fn block(&self, id: BlockId) -> Option<&UpdateBlock> {
        self.live_block(id).ok().map(|e| &e.block)
    }

    /// Block named `name` owned by `component`.
    pub fn block_by_name(&self, component: ComponentId, name: &str) -> Option<BlockId> {
        self.live(component).ok()?.blocks.get(name).copied()
    }

    /// Owning component of a live block.
    pub fn owner_of(&self, block: BlockId) -> Option<ComponentId> {
        self.live_block(block).ok().map(|e| e.owner)
    }

    fn validate_constraint(&self, c: Constraint) -> Result<(), RegistryError> {
        let before = self.live_block(c.before)?;
        self.live_block(c.after)?;
        if c.before == c.after {
            return Err(RegistryError::SelfConstraint {
                block: before.block.name().to_string(),
            });
        }
        if let Some(&owner) = self.constraints.get(&c) {
            return Err(self.duplicate(c, owner));
        }
        Ok(())
    }

    fn duplicate(&self, c: Constraint, owner: ComponentId) -> RegistryError {
        let name = |b: BlockId| {
            self.blocks
                .get(b.0 as usize)
                .map_or_else(|| format!("#{b}"), |e| e.block.name().to_string())
        };
        RegistryError::DuplicateConstraint {
            before: name(c.before),
            after: name(c.after),
            owner: self.path_or_id(owner),
        }
    }

    /// Declare `before < after` in `component`.
    pub fn add_constraint(
        &mut self,
        component: ComponentId,
        before: BlockId,
        after: BlockId,
    ) -> Result<(), RegistryError> {
        self.add_constraints(component, [(before, after)])
    }

    /// Declare several constraints in `component`. All-or-nothing: if any
    /// pair is rejected, none are added.
    pub fn add_constraints(
        &mut self,
        component: ComponentId,
        pairs: impl IntoIterator<Item = (BlockId, BlockId)>,
    ) -> Result<(), RegistryError> {
        self.live(component)?;
        let mut batch: IndexSet<Constraint> = IndexSet::new();
        for (before, after) in pairs {
            let c = Constraint::new(before, after);
            self.validate_constraint(c)?;
            if !batch.insert(c) {
                return Err(self.duplicate(c, component));
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        for &c in &batch {
            self.constraints.insert(c, component);
            self.components[component.0 as usize].constraints.insert(c);
        }
        self.touch();
        debug!(component = %component, added = batch.len(), "constraints declared");
        Ok(())
    }

    /// Live components in pre-order, filtered by `predicate`.
    pub fn collect_all<F>(&self, predicate: F) -> Vec<ComponentId>
    where
        F: Fn(ComponentId, &Component) -> bool,
    {
        self.collect_from(self.top(), predicate)
    }

    fn collect_from<F>(&self, start: ComponentId, predicate: F) -> Vec<ComponentId>
    where
        F: Fn(ComponentId, &Component) -> bool,
    {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Ok(node) = self.live(id) else {
                continue;
            };
            if predicate(id, node) {
                out.push(id);
            }
            stack.extend(node.children.values().rev().copied());
        }
        out
    }

    /// Number of live blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.alive).count()
    }

    /// The flattened view of all live blocks and constraints.
    ///
    /// Cached until the next structural edit.
    pub fn aggregate(&self) -> &Aggregate {
        self.cache.get_or_init(|| {
            let mut agg = Aggregate::default();
            for (i, e) in self.blocks.iter().enumerate() {
                if e.alive {
                    let id = BlockId(i as u32);
                    agg.blocks.push(id);
                    agg.owners.insert(id, e.owner);
                }
            }
            agg.constraints = self.constraints.keys().copied().collect();
            agg
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tickweave_block::Body;

    fn nop(name: &str) -> UpdateBlock {
        UpdateBlock::new(name, Body::empty(), |_| Ok(()))
    }

    #[test]
    fn duplicate_block_name_fails_immediately() {
        let mut h = Hierarchy::new("top");
        h.register_block(h.top(), nop("up")).unwrap();
        let err = h.register_block(h.top(), nop("up")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateBlockName {
                component: "top".into(),
                name: "up".into()
            }
        );
        assert_eq!(h.block_count(), 1);
    }

    #[test]
    fn same_block_name_in_different_components() {
        let mut h = Hierarchy::new("top");
        let a = h.add_component(h.top(), "a").unwrap();
        let b = h.add_component(h.top(), "b").unwrap();
        let x = h.register_block(a, nop("up")).unwrap();
        let y = h.register_block(b, nop("up")).unwrap();
        assert_ne!(x, y);
        assert_eq!(h.block_by_name(b, "up"), Some(y));
        assert_eq!(h.owner_of(x), Some(a));
    }

    #[test]
    fn duplicate_component_name() {
        let mut h = Hierarchy::new("top");
        h.add_component(h.top(), "sub").unwrap();
        assert!(matches!(
            h.add_component(h.top(), "sub"),
            Err(RegistryError::DuplicateComponentName { .. })
        ));
    }

    #[test]
    fn paths_are_dotted() {
        let mut h = Hierarchy::new("top");
        let sub = h.add_component(h.top(), "sub").unwrap();
        let reg = h.add_component(sub, "reg").unwrap();
        assert_eq!(h.path_of(reg).as_deref(), Some("top.sub.reg"));
        assert_eq!(h.component_by_name(sub, "reg"), Some(reg));
    }

    #[test]
    fn constraint_validation() {
        let mut h = Hierarchy::new("top");
        let a = h.register_block(h.top(), nop("a")).unwrap();
        let b = h.register_block(h.top(), nop("b")).unwrap();
        let sub = h.add_component(h.top(), "sub").unwrap();

        assert!(matches!(
            h.add_constraint(h.top(), a, a),
            Err(RegistryError::SelfConstraint { .. })
        ));
        assert!(matches!(
            h.add_constraint(h.top(), a, BlockId(9)),
            Err(RegistryError::UnknownBlock { .. })
        ));
        h.add_constraint(h.top(), a, b).unwrap();
        // Duplicates are rejected anywhere in the hierarchy.
        match h.add_constraint(sub, a, b) {
            Err(RegistryError::DuplicateConstraint { owner, .. }) => assert_eq!(owner, "top"),
            other => panic!("expected DuplicateConstraint, got {other:?}"),
        }
        // The reverse pair is a different constraint.
        h.add_constraint(sub, b, a).unwrap();
        assert_eq!(h.aggregate().constraints.len(), 2);
    }

    #[test]
    fn add_constraints_is_all_or_nothing() {
        let mut h = Hierarchy::new("top");
        let a = h.register_block(h.top(), nop("a")).unwrap();
        let b = h.register_block(h.top(), nop("b")).unwrap();
        let c = h.register_block(h.top(), nop("c")).unwrap();
        let rev = h.revision();

        let err = h.add_constraints(h.top(), [(a, b), (b, c), (a, b)]);
        assert!(matches!(err, Err(RegistryError::DuplicateConstraint { .. })));
        assert!(h.aggregate().constraints.is_empty());
        assert_eq!(h.revision(), rev);

        h.add_constraints(h.top(), [(a, b), (b, c)]).unwrap();
        assert_eq!(
            h.aggregate().constraints,
            vec![Constraint::new(a, b), Constraint::new(b, c)]
        );
    }

    #[test]
    fn removal_retracts_blocks_and_constraints() {
        let mut h = Hierarchy::new("top");
        let keep = h.register_block(h.top(), nop("keep")).unwrap();
        let sub = h.add_component(h.top(), "sub").unwrap();
        let leaf = h.add_component(sub, "leaf").unwrap();
        let s = h.register_block(sub, nop("s")).unwrap();
        let l = h.register_block(leaf, nop("l")).unwrap();
        h.add_constraint(sub, s, l).unwrap();
        // Declared at the top but references a block inside `sub`.
        h.add_constraint(h.top(), keep, s).unwrap();

        h.remove_component(sub).unwrap();
        let agg = h.aggregate();
        assert_eq!(agg.blocks, vec![keep]);
        assert!(agg.constraints.is_empty());
        assert_eq!(h.owner_of(l), None);
        assert_eq!(h.component(leaf).map(|c| c.name()), None);
        assert_eq!(h.block_by_name(h.top(), "keep"), Some(keep));

        assert_eq!(
            h.remove_component(sub),
            Err(RegistryError::UnknownComponent { component: sub })
        );
        assert_eq!(h.remove_component(h.top()), Err(RegistryError::CannotRemoveRoot));

        // The name is free again.
        let sub2 = h.add_component(h.top(), "sub").unwrap();
        assert_ne!(sub2, sub);
    }

    #[test]
    fn remove_by_name() {
        let mut h = Hierarchy::new("top");
        let sub = h.add_component(h.top(), "sub").unwrap();
        h.register_block(sub, nop("x")).unwrap();
        h.remove_component_by_name(h.top(), "sub").unwrap();
        assert_eq!(h.block_count(), 0);
        assert!(h.remove_component_by_name(h.top(), "sub").is_err());
    }

    #[test]
    fn aggregate_is_cached_and_invalidated() {
        let mut h = Hierarchy::new("top");
        h.register_block(h.top(), nop("a")).unwrap();
        let first = h.aggregate().clone();
        assert_eq!(h.aggregate(), &first);
        let rev = h.revision();
        h.register_block(h.top(), nop("b")).unwrap();
        assert!(h.revision() > rev);
        assert_eq!(h.aggregate().blocks.len(), 2);
    }

    #[test]
    fn collect_all_is_preorder() {
        let mut h = Hierarchy::new("top");
        let a = h.add_component(h.top(), "a").unwrap();
        let a1 = h.add_component(a, "a1").unwrap();
        let b = h.add_component(h.top(), "b").unwrap();
        assert_eq!(h.collect_all(|_, _| true), vec![h.top(), a, a1, b]);
        let leaves = h.collect_all(|_, c| c.children().next().is_none());
        assert_eq!(leaves, vec![a1, b]);
    }

    proptest! {
        #[test]
        fn aggregate_matches_live_blocks(ops in prop::collection::vec((0u8..3, 0usize..6), 0..40)) {
            let mut h = Hierarchy::new("top");
            let mut comps = vec![h.top()];
            let mut n = 0;
            for (op, pick) in ops {
                let target = comps[pick % comps.len()];
                match op {
                    0 => {
                        if let Ok(c) = h.add_component(target, format!("c{n}")) {
                            comps.push(c);
                        }
                    }
                    1 => {
                        let _ = h.register_block(target, nop(&format!("b{n}")));
                    }
                    _ => {
                        let _ = h.remove_component(target);
                    }
                }
                n += 1;
            }
            let agg = h.aggregate().clone();
            prop_assert_eq!(agg.blocks.len(), h.block_count());
            for w in agg.blocks.windows(2) {
                prop_assert!(w[0] < w[1]);
            }
            for &b in &agg.blocks {
                prop_assert!(h.owner_of(b).is_some());
                prop_assert_eq!(agg.owners.get(&b).copied(), h.owner_of(b));
            }
            // Rebuilding from scratch yields the same view.
            h.touch();
            prop_assert_eq!(h.aggregate(), &agg);
        }
    }
}
