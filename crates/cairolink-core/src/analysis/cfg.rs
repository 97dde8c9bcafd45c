use crate::analysis::statements::{Statement, StatementKind};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Entry,
    Exit,
    Statement,
    Branch,
    Merge,
    LoopHeader,
    LoopBack,
}

#[derive(Debug, Clone, Serialize)]
pub struct CfgNode {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<Statement>,
    pub successors: Vec<NodeId>,
    pub predecessors: Vec<NodeId>,
    /// Source line range this node covers; absent for entry/exit/merge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<(usize, usize)>,
}

/// Per-function control flow graph. Adjacency is stored as node indices so
/// loop cycles never fight ownership.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub function_name: String,
    pub nodes: Vec<CfgNode>,
    pub entry_node: NodeId,
    pub exit_nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathEnumeration {
    pub paths: Vec<Vec<NodeId>>,
    pub truncated: bool,
}

impl Cfg {
    fn new(function_name: &str) -> Self {
        Self {
            function_name: function_name.to_string(),
            nodes: Vec::new(),
            entry_node: NodeId(0),
            exit_nodes: Vec::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> &CfgNode {
        &self.nodes[id.0 as usize]
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0 as usize].successors
    }

    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0 as usize].predecessors
    }

    pub fn is_exit(&self, id: NodeId) -> bool {
        self.exit_nodes.contains(&id)
    }

    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .flat_map(|n| n.successors.iter().map(move |&s| (n.id, s)))
            .collect()
    }

    pub fn reachable(&self) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([self.entry_node]);
        while let Some(current) = queue.pop_front() {
            if visited.insert(current) {
                for &succ in self.successors(current) {
                    queue.push_back(succ);
                }
            }
        }
        visited
    }

    fn reverse_postorder(&self) -> Vec<NodeId> {
        fn visit(cfg: &Cfg, id: NodeId, seen: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
            if !seen.insert(id) {
                return;
            }
            for &succ in cfg.successors(id) {
                visit(cfg, succ, seen, order);
            }
            order.push(id);
        }

        let mut seen = HashSet::new();
        let mut order = Vec::new();
        visit(self, self.entry_node, &mut seen, &mut order);
        order.reverse();
        order
    }

    /// Set-valued dominator fixed point over the reachable subgraph:
    /// `Dom(entry) = {entry}`, `Dom(n) = {n} ∪ ⋂ Dom(p)` over predecessors.
    pub fn dominators(&self) -> HashMap<NodeId, HashSet<NodeId>> {
        let order = self.reverse_postorder();
        let reachable: HashSet<NodeId> = order.iter().copied().collect();
        let mut dominators: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();

        dominators.insert(self.entry_node, HashSet::from([self.entry_node]));
        for &node in &order {
            if node != self.entry_node {
                dominators.insert(node, reachable.clone());
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &node in &order {
                if node == self.entry_node {
                    continue;
                }
                let mut new_doms = HashSet::from([node]);
                let preds: Vec<NodeId> = self
                    .predecessors(node)
                    .iter()
                    .copied()
                    .filter(|p| reachable.contains(p))
                    .collect();
                if let Some((first, rest)) = preds.split_first() {
                    let mut intersection = dominators[first].clone();
                    for pred in rest {
                        let pred_doms = &dominators[pred];
                        intersection.retain(|d| pred_doms.contains(d));
                    }
                    new_doms.extend(intersection);
                }
                if dominators.get(&node) != Some(&new_doms) {
                    dominators.insert(node, new_doms);
                    changed = true;
                }
            }
        }

        dominators
    }

    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        self.dominators()
            .get(&b)
            .map(|doms| doms.contains(&a))
            .unwrap_or(false)
    }

    /// Depth-first entry-to-exit path enumeration. An edge back to a node
    /// already on the current path terminates that path, so loops contribute
    /// their acyclic prefixes only.
    pub fn enumerate_paths(&self, max_paths: usize) -> PathEnumeration {
        let mut result = PathEnumeration {
            paths: Vec::new(),
            truncated: false,
        };
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        self.dfs_paths(self.entry_node, &mut path, &mut on_path, max_paths, &mut result);
        result
    }

    fn dfs_paths(
        &self,
        current: NodeId,
        path: &mut Vec<NodeId>,
        on_path: &mut HashSet<NodeId>,
        max_paths: usize,
        result: &mut PathEnumeration,
    ) {
        if result.paths.len() >= max_paths {
            result.truncated = true;
            return;
        }
        path.push(current);
        on_path.insert(current);

        if self.is_exit(current) {
            result.paths.push(path.clone());
        } else {
            for &succ in self.successors(current) {
                if !on_path.contains(&succ) {
                    self.dfs_paths(succ, path, on_path, max_paths, result);
                }
            }
        }

        path.pop();
        on_path.remove(&current);
    }
}

impl Serialize for Cfg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Cfg", 5)?;
        s.serialize_field("function_name", &self.function_name)?;
        s.serialize_field("entry_node", &self.entry_node)?;
        s.serialize_field("exit_nodes", &self.exit_nodes)?;
        s.serialize_field("nodes", &self.nodes)?;
        s.serialize_field("edges", &self.edges())?;
        s.end()
    }
}

/// Statement tree reconstructed from the flat block markers.
#[derive(Debug)]
enum Item {
    Leaf(Statement),
    Block(BlockItem),
}

#[derive(Debug)]
struct BlockItem {
    header: Option<Statement>,
    items: Vec<Item>,
}

/// Folds a flat statement sequence into a CFG by structured lowering.
pub struct CfgBuilder {
    cfg: Cfg,
    exit: NodeId,
}

struct LoopCtx {
    header: NodeId,
    loopback: Option<NodeId>,
    breaks: Vec<NodeId>,
}

impl CfgBuilder {
    pub fn build(function_name: &str, statements: &[Statement]) -> Cfg {
        let mut builder = CfgBuilder {
            cfg: Cfg::new(function_name),
            exit: NodeId(0),
        };

        let entry = builder.new_node(NodeKind::Entry, None);
        let exit = builder.new_node(NodeKind::Exit, None);
        builder.cfg.entry_node = entry;
        builder.cfg.exit_nodes.push(exit);
        builder.exit = exit;

        let tree = build_tree(statements);
        let mut loops = Vec::new();
        let frontier = builder.lower_items(&tree, vec![entry], &mut loops);
        builder.connect(&frontier, exit);

        builder.cfg
    }

    fn new_node(&mut self, kind: NodeKind, statement: Option<Statement>) -> NodeId {
        let id = NodeId(self.cfg.nodes.len() as u32);
        let lines = statement.as_ref().map(|s| (s.line, s.line));
        self.cfg.nodes.push(CfgNode {
            id,
            kind,
            statement,
            successors: Vec::new(),
            predecessors: Vec::new(),
            lines,
        });
        id
    }

    fn add_edge(&mut self, from: NodeId, to: NodeId) {
        let succs = &mut self.cfg.nodes[from.0 as usize].successors;
        if !succs.contains(&to) {
            succs.push(to);
        }
        let preds = &mut self.cfg.nodes[to.0 as usize].predecessors;
        if !preds.contains(&from) {
            preds.push(from);
        }
    }

    fn connect(&mut self, preds: &[NodeId], to: NodeId) {
        for &p in preds {
            self.add_edge(p, to);
        }
    }

    /// Lower a statement sequence. `frontier` holds the dangling nodes whose
    /// fallthrough reaches the next lowered node; an empty frontier means the
    /// path terminated and anything that follows is unreachable.
    fn lower_items(
        &mut self,
        items: &[Item],
        mut frontier: Vec<NodeId>,
        loops: &mut Vec<LoopCtx>,
    ) -> Vec<NodeId> {
        let mut i = 0;
        while i < items.len() {
            match &items[i] {
                Item::Leaf(stmt) => {
                    frontier = self.lower_leaf(stmt, frontier, loops);
                }
                Item::Block(block) => match block.header.as_ref().map(|h| h.kind) {
                    Some(StatementKind::If) => {
                        let chain_start = i + 1;
                        let mut chain_end = chain_start;
                        while chain_end < items.len() && is_else_block(&items[chain_end]) {
                            chain_end += 1;
                        }
                        let else_chain: Vec<&BlockItem> = items[chain_start..chain_end]
                            .iter()
                            .map(|item| match item {
                                Item::Block(b) => b,
                                Item::Leaf(_) => unreachable!("else chain holds blocks only"),
                            })
                            .collect();
                        let header = block.header.clone().expect("if block has a header");
                        frontier =
                            self.lower_if_chain(header, &block.items, &else_chain, frontier, loops);
                        i = chain_end;
                        continue;
                    }
                    Some(StatementKind::Loop)
                    | Some(StatementKind::While)
                    | Some(StatementKind::For) => {
                        let header = block.header.clone().expect("loop block has a header");
                        frontier = self.lower_loop(header, &block.items, frontier, loops);
                    }
                    // Orphan else or a bare `{ .. }` scope lowers inline.
                    _ => {
                        frontier = self.lower_items(&block.items, frontier, loops);
                    }
                },
            }
            i += 1;
        }
        frontier
    }

    fn lower_leaf(
        &mut self,
        stmt: &Statement,
        frontier: Vec<NodeId>,
        loops: &mut Vec<LoopCtx>,
    ) -> Vec<NodeId> {
        match stmt.kind {
            StatementKind::Return => {
                let node = self.new_node(NodeKind::Statement, Some(stmt.clone()));
                self.connect(&frontier, node);
                let exit = self.exit;
                self.add_edge(node, exit);
                Vec::new()
            }
            StatementKind::Break => {
                let node = self.new_node(NodeKind::Statement, Some(stmt.clone()));
                self.connect(&frontier, node);
                match loops.last_mut() {
                    Some(ctx) => ctx.breaks.push(node),
                    None => {
                        let exit = self.exit;
                        self.add_edge(node, exit);
                    }
                }
                Vec::new()
            }
            StatementKind::Continue => {
                let node = self.new_node(NodeKind::Statement, Some(stmt.clone()));
                self.connect(&frontier, node);
                if loops.last().is_some() {
                    let loopback = {
                        let needs = loops.last().unwrap().loopback.is_none();
                        if needs {
                            let lb = self.new_node(NodeKind::LoopBack, None);
                            loops.last_mut().unwrap().loopback = Some(lb);
                        }
                        loops.last().unwrap().loopback.unwrap()
                    };
                    self.add_edge(node, loopback);
                } else {
                    let exit = self.exit;
                    self.add_edge(node, exit);
                }
                Vec::new()
            }
            _ => {
                let node = self.new_node(NodeKind::Statement, Some(stmt.clone()));
                self.connect(&frontier, node);
                vec![node]
            }
        }
    }

    /// Branch lowering. The first successor added is always the true arm,
    /// the second the false arm or merge. A merge node is synthesized only
    /// when at least one arm actually falls through.
    fn lower_if_chain(
        &mut self,
        cond: Statement,
        then_items: &[Item],
        else_chain: &[&BlockItem],
        frontier: Vec<NodeId>,
        loops: &mut Vec<LoopCtx>,
    ) -> Vec<NodeId> {
        let branch = self.new_node(NodeKind::Branch, Some(cond));
        self.connect(&frontier, branch);

        if then_items.is_empty() && !else_chain.is_empty() {
            // Empty then-arm: wire the true edge to the merge before the else
            // arm claims the second successor slot.
            let merge = self.new_node(NodeKind::Merge, None);
            self.add_edge(branch, merge);
            let else_frontier = self.lower_else_chain(else_chain, vec![branch], loops);
            self.connect(&else_frontier, merge);
            return vec![merge];
        }

        let then_frontier = self.lower_items(then_items, vec![branch], loops);
        let else_frontier = if else_chain.is_empty() {
            vec![branch]
        } else {
            self.lower_else_chain(else_chain, vec![branch], loops)
        };

        let mut fallers = then_frontier;
        for id in else_frontier {
            if !fallers.contains(&id) {
                fallers.push(id);
            }
        }
        if fallers.is_empty() {
            return Vec::new();
        }
        let merge = self.new_node(NodeKind::Merge, None);
        self.connect(&fallers, merge);
        vec![merge]
    }

    fn lower_else_chain(
        &mut self,
        chain: &[&BlockItem],
        preds: Vec<NodeId>,
        loops: &mut Vec<LoopCtx>,
    ) -> Vec<NodeId> {
        let first = chain[0];
        let is_else_if = first
            .header
            .as_ref()
            .map(|h| h.condition.is_some())
            .unwrap_or(false);
        if is_else_if {
            // `else if` desugars to a nested branch fed by the false edge.
            let header = first.header.clone().expect("else-if has a header");
            self.lower_if_chain(header, &first.items, &chain[1..], preds, loops)
        } else {
            self.lower_items(&first.items, preds, loops)
        }
    }

    fn lower_loop(
        &mut self,
        header_stmt: Statement,
        body: &[Item],
        frontier: Vec<NodeId>,
        loops: &mut Vec<LoopCtx>,
    ) -> Vec<NodeId> {
        let conditional = matches!(
            header_stmt.kind,
            StatementKind::While | StatementKind::For
        );
        let header = self.new_node(NodeKind::LoopHeader, Some(header_stmt));
        self.connect(&frontier, header);

        loops.push(LoopCtx {
            header,
            loopback: None,
            breaks: Vec::new(),
        });
        let body_frontier = self.lower_items(body, vec![header], loops);
        let ctx = loops.pop().expect("loop context pushed above");

        if !body_frontier.is_empty() || ctx.loopback.is_some() {
            let loopback = match ctx.loopback {
                Some(lb) => lb,
                None => self.new_node(NodeKind::LoopBack, None),
            };
            self.connect(&body_frontier, loopback);
            self.add_edge(loopback, ctx.header);
        }

        let mut post = Vec::new();
        if conditional {
            post.push(header);
        }
        post.extend(ctx.breaks);
        post
    }
}

fn is_else_block(item: &Item) -> bool {
    matches!(
        item,
        Item::Block(BlockItem {
            header: Some(h),
            ..
        }) if h.kind == StatementKind::Else
    )
}

/// Rebuild block structure from the flat `block_open`/`block_close` markers.
/// Control statements adopt the block that immediately follows them.
fn build_tree(statements: &[Statement]) -> Vec<Item> {
    let mut stack: Vec<(Option<Statement>, Vec<Item>)> = vec![(None, Vec::new())];
    let mut pending: Option<Statement> = None;

    for stmt in statements {
        match stmt.kind {
            StatementKind::BlockOpen => {
                stack.push((pending.take(), Vec::new()));
            }
            StatementKind::BlockClose => {
                if let Some(p) = pending.take() {
                    stack.last_mut().unwrap().1.push(Item::Leaf(p));
                }
                if stack.len() > 1 {
                    let (header, items) = stack.pop().unwrap();
                    stack
                        .last_mut()
                        .unwrap()
                        .1
                        .push(Item::Block(BlockItem { header, items }));
                }
            }
            _ if stmt.is_control() => {
                if let Some(p) = pending.take() {
                    stack.last_mut().unwrap().1.push(Item::Leaf(p));
                }
                pending = Some(stmt.clone());
            }
            _ => {
                if let Some(p) = pending.take() {
                    stack.last_mut().unwrap().1.push(Item::Leaf(p));
                }
                stack.last_mut().unwrap().1.push(Item::Leaf(stmt.clone()));
            }
        }
    }

    if let Some(p) = pending {
        stack.last_mut().unwrap().1.push(Item::Leaf(p));
    }
    // Tolerate unbalanced bodies: unwind whatever is left open.
    while stack.len() > 1 {
        let (header, items) = stack.pop().unwrap();
        stack
            .last_mut()
            .unwrap()
            .1
            .push(Item::Block(BlockItem { header, items }));
    }
    stack.pop().unwrap().1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::statements::StatementParser;

    fn build(body: &str) -> Cfg {
        let statements = StatementParser::new().parse(body, 1);
        CfgBuilder::build("test", &statements)
    }

    fn count_kind(cfg: &Cfg, kind: NodeKind) -> usize {
        cfg.nodes.iter().filter(|n| n.kind == kind).count()
    }

    #[test]
    fn empty_body_connects_entry_to_exit() {
        let cfg = build("fn f() {\n}");
        assert_eq!(cfg.nodes.len(), 2);
        assert_eq!(cfg.successors(cfg.entry_node), &[cfg.exit_nodes[0]]);
    }

    #[test]
    fn straight_line_chain() {
        let cfg = build("fn f() {\n    let a = 1;\n    let b = a;\n    return b;\n}");
        assert_eq!(count_kind(&cfg, NodeKind::Statement), 3);
        let paths = cfg.enumerate_paths(10);
        assert_eq!(paths.paths.len(), 1);
        assert!(!paths.truncated);
    }

    #[test]
    fn branching_returns_skip_the_merge() {
        // Both arms return: Entry, Branch, two returns, Exit and nothing else.
        let cfg = build(
            "fn f(x: bool) {\n    if x {\n        return 1;\n    } else {\n        return 2;\n    }\n}",
        );
        assert_eq!(cfg.nodes.len(), 5);
        assert_eq!(count_kind(&cfg, NodeKind::Entry), 1);
        assert_eq!(count_kind(&cfg, NodeKind::Branch), 1);
        assert_eq!(count_kind(&cfg, NodeKind::Statement), 2);
        assert_eq!(count_kind(&cfg, NodeKind::Exit), 1);
        assert_eq!(count_kind(&cfg, NodeKind::Merge), 0);

        let paths = cfg.enumerate_paths(10);
        assert_eq!(paths.paths.len(), 2);

        let branch = cfg
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Branch)
            .unwrap()
            .id;
        let doms = cfg.dominators();
        for node in &cfg.nodes {
            if node.kind == NodeKind::Statement {
                assert!(doms[&node.id].contains(&branch));
            }
            assert!(doms[&node.id].contains(&cfg.entry_node));
            assert!(doms[&node.id].contains(&node.id));
        }
    }

    #[test]
    fn if_without_else_merges_both_ways() {
        let cfg = build("fn f(x: bool) {\n    if x {\n        let y = 1;\n    }\n    return;\n}");
        let branch = cfg
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Branch)
            .unwrap();
        assert_eq!(branch.successors.len(), 2);
        // First successor is the then-arm, second the synthesized merge.
        assert_eq!(cfg.node(branch.successors[0]).kind, NodeKind::Statement);
        assert_eq!(cfg.node(branch.successors[1]).kind, NodeKind::Merge);
    }

    #[test]
    fn else_if_desugars_to_nested_branches() {
        let body = "fn f(x: u8) {\n    if x {\n        let a = 1;\n    } else if y {\n        let b = 2;\n    } else {\n        let c = 3;\n    }\n    return;\n}";
        let cfg = build(body);
        assert_eq!(count_kind(&cfg, NodeKind::Branch), 2);
        let paths = cfg.enumerate_paths(20);
        assert_eq!(paths.paths.len(), 3);
    }

    #[test]
    fn loop_builds_header_and_back_edge() {
        let body = "fn f() {\n    loop {\n        step();\n        if done {\n            break;\n        }\n    }\n    return;\n}";
        let cfg = build(body);
        assert_eq!(count_kind(&cfg, NodeKind::LoopHeader), 1);
        assert_eq!(count_kind(&cfg, NodeKind::LoopBack), 1);

        let header = cfg
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::LoopHeader)
            .unwrap()
            .id;
        let loopback = cfg
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::LoopBack)
            .unwrap();
        assert_eq!(loopback.successors, vec![header]);

        // Break reaches the post-loop return without passing the header again.
        let paths = cfg.enumerate_paths(50);
        assert!(!paths.paths.is_empty());
        assert!(!paths.truncated);
    }

    #[test]
    fn while_header_exits_to_following_statement() {
        let body = "fn f(n: u8) {\n    while n {\n        tick();\n    }\n    return;\n}";
        let cfg = build(body);
        let header = cfg
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::LoopHeader)
            .unwrap();
        assert_eq!(header.successors.len(), 2);
        // Body first, loop exit second.
        let exit_succ = cfg.node(header.successors[1]);
        assert_eq!(exit_succ.kind, NodeKind::Statement);
    }

    #[test]
    fn continue_targets_the_loop_back_node() {
        let body = "fn f() {\n    while x {\n        if skip {\n            continue;\n        }\n        work();\n    }\n}";
        let cfg = build(body);
        let loopback = cfg
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::LoopBack)
            .unwrap();
        assert!(loopback.predecessors.len() >= 2);
    }

    #[test]
    fn unreachable_statement_has_no_predecessors() {
        let body = "fn f() {\n    return;\n    let dead = 1;\n}";
        let cfg = build(body);
        let dead = cfg
            .nodes
            .iter()
            .find(|n| {
                n.statement
                    .as_ref()
                    .map(|s| s.defined.as_deref() == Some("dead"))
                    .unwrap_or(false)
            })
            .unwrap();
        assert!(dead.predecessors.is_empty());
        assert!(!cfg.reachable().contains(&dead.id));
    }

    #[test]
    fn well_formedness_over_reachable_nodes() {
        let body = "fn f(x: bool) {\n    if x {\n        let a = 1;\n    } else {\n        let b = 2;\n    }\n    return a;\n}";
        let cfg = build(body);
        let reachable = cfg.reachable();
        for node in &cfg.nodes {
            if !reachable.contains(&node.id) {
                continue;
            }
            if node.id != cfg.entry_node {
                assert!(
                    !node.predecessors.is_empty(),
                    "{} has no predecessors",
                    node.id
                );
            }
            if cfg.is_exit(node.id) {
                assert!(node.successors.is_empty());
            } else {
                assert!(!node.successors.is_empty(), "{} has no successors", node.id);
            }
        }
    }

    #[test]
    fn path_enumeration_caps_and_flags_truncation() {
        let mut body = String::from("fn f(a: bool) {\n");
        for i in 0..6 {
            body.push_str(&format!("    if c{i} {{\n        let x{i} = 1;\n    }}\n"));
        }
        body.push_str("    return;\n}\n");
        let cfg = build(&body);
        let capped = cfg.enumerate_paths(4);
        assert_eq!(capped.paths.len(), 4);
        assert!(capped.truncated);
        let full = cfg.enumerate_paths(1000);
        assert_eq!(full.paths.len(), 64);
        assert!(!full.truncated);
    }
}
