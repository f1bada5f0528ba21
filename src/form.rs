use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AdminError, Result};
use crate::recipe::{Ingredient, RecipeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches('#');
        digits
            .parse()
            .map(NodeId)
            .map_err(|_| AdminError::InvalidNode(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientRow {
    pub id: NodeId,
    pub ingredient: Ingredient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBlock {
    pub id: NodeId,
    /// Cosmetic heading, never renumbered.
    pub label: String,
    pub name: String,
    pub rows: Vec<IngredientRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substep {
    pub id: NodeId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepBlock {
    pub id: NodeId,
    pub label: String,
    pub time: String,
    pub needed: Vec<IngredientRow>,
    pub substeps: Vec<Substep>,
}

#[derive(Debug, Clone, Default)]
pub struct FormTree {
    inputs: HashMap<String, String>,
    image: String,
    record_id: Option<RecipeId>,
    groups: Vec<GroupBlock>,
    steps: Vec<StepBlock>,
    next_node: u64,
    group_count: usize,
    step_count: usize,
}

impl FormTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the input with the given element id; blank when never set.
    pub fn input(&self, element: &str) -> &str {
        self.inputs.get(element).map(String::as_str).unwrap_or("")
    }

    pub fn set_input(&mut self, element: &str, value: &str) {
        self.inputs.insert(element.to_string(), value.to_string());
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn set_image(&mut self, image: String) {
        self.image = image;
    }

    pub fn record_id(&self) -> Option<&RecipeId> {
        self.record_id.as_ref()
    }

    pub fn set_record_id(&mut self, id: Option<RecipeId>) {
        self.record_id = id;
    }

    pub fn groups(&self) -> &[GroupBlock] {
        &self.groups
    }

    pub fn steps(&self) -> &[StepBlock] {
        &self.steps
    }

    fn next_id(&mut self) -> NodeId {
        self.next_node += 1;
        NodeId(self.next_node)
    }

    pub fn add_group(&mut self, name: &str) -> NodeId {
        self.group_count += 1;
        let id = self.next_id();
        self.groups.push(GroupBlock {
            id,
            label: format!("Group {}", self.group_count),
            name: name.to_string(),
            rows: Vec::new(),
        });
        id
    }

    pub fn add_ingredient(&mut self, group: NodeId, ingredient: Ingredient) -> Result<NodeId> {
        let id = self.next_id();
        let block = self
            .groups
            .iter_mut()
            .find(|g| g.id == group)
            .ok_or(AdminError::UnknownNode(group))?;
        block.rows.push(IngredientRow { id, ingredient });
        Ok(id)
    }

    pub fn add_step(&mut self, time: &str) -> NodeId {
        self.step_count += 1;
        let id = self.next_id();
        self.steps.push(StepBlock {
            id,
            label: format!("Step {}", self.step_count),
            time: time.to_string(),
            needed: Vec::new(),
            substeps: Vec::new(),
        });
        id
    }

    pub fn add_needed(&mut self, step: NodeId, ingredient: Ingredient) -> Result<NodeId> {
        let id = self.next_id();
        self.step_mut(step)?.needed.push(IngredientRow { id, ingredient });
        Ok(id)
    }

    pub fn add_substep(&mut self, step: NodeId, text: &str) -> Result<NodeId> {
        let id = self.next_id();
        self.step_mut(step)?.substeps.push(Substep {
            id,
            text: text.to_string(),
        });
        Ok(id)
    }

    fn step_mut(&mut self, step: NodeId) -> Result<&mut StepBlock> {
        self.steps
            .iter_mut()
            .find(|s| s.id == step)
            .ok_or(AdminError::UnknownNode(step))
    }

    fn row_mut(&mut self, node: NodeId) -> Option<&mut IngredientRow> {
        let in_groups = self.groups.iter_mut().flat_map(|g| g.rows.iter_mut());
        let in_steps = self.steps.iter_mut().flat_map(|s| s.needed.iter_mut());
        in_groups.chain(in_steps).find(|r| r.id == node)
    }

    /// Writes `value` into whatever `node` is: a group's name, a step's time,
    /// a substep's text, or an ingredient row given as `amount; unit; name`.
    pub fn fill(&mut self, node: NodeId, value: &str) -> Result<()> {
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == node) {
            group.name = value.to_string();
            return Ok(());
        }
        if let Some(step) = self.steps.iter_mut().find(|s| s.id == node) {
            step.time = value.to_string();
            return Ok(());
        }
        if let Some(row) = self.row_mut(node) {
            row.ingredient = Ingredient::from_row(value);
            return Ok(());
        }
        let substep = self
            .steps
            .iter_mut()
            .flat_map(|s| s.substeps.iter_mut())
            .find(|s| s.id == node)
            .ok_or(AdminError::UnknownNode(node))?;
        substep.text = value.to_string();
        Ok(())
    }

    /// Removes `node` and everything below it. Siblings keep their ids and labels.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        let before = self.groups.len() + self.steps.len();
        self.groups.retain(|g| g.id != node);
        self.steps.retain(|s| s.id != node);
        if self.groups.len() + self.steps.len() < before {
            return Ok(());
        }

        for group in &mut self.groups {
            if let Some(pos) = group.rows.iter().position(|r| r.id == node) {
                group.rows.remove(pos);
                return Ok(());
            }
        }
        for step in &mut self.steps {
            if let Some(pos) = step.needed.iter().position(|r| r.id == node) {
                step.needed.remove(pos);
                return Ok(());
            }
            if let Some(pos) = step.substeps.iter().position(|s| s.id == node) {
                step.substeps.remove(pos);
                return Ok(());
            }
        }
        Err(AdminError::UnknownNode(node))
    }

    pub fn reset(&mut self) {
        *self = FormTree::new();
    }
}
