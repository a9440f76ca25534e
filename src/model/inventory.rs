use crate::error::{Result, SandboxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
}

pub const CATALOG: &[Item] = &[
    Item { id: 1, name: "Copper Ore", description: "A chunk of raw copper." },
    Item { id: 2, name: "Stone", description: "Plain grey stone." },
    Item { id: 3, name: "Iron Ore", description: "A chunk of raw iron." },
];

pub fn item_by_id(id: u32) -> Option<&'static Item> {
    CATALOG.iter().find(|item| item.id == id)
}

/// Exact, case-sensitive name match.
pub fn item_by_name(name: &str) -> Option<&'static Item> {
    CATALOG.iter().find(|item| item.name == name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub item: &'static Item,
    pub quantity: u32,
}

/// Item stacks in the order they were first added.
#[derive(Debug, Default)]
pub struct Inventory {
    stacks: Vec<ItemStack>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stacks(&self) -> &[ItemStack] {
        &self.stacks
    }

    pub fn add_item(&mut self, id: u32, quantity: u32) -> Result<()> {
        let item = item_by_id(id).ok_or(SandboxError::UnknownItem(id))?;
        match self.stacks.iter_mut().find(|s| s.item.id == id) {
            Some(stack) => stack.quantity = stack.quantity.saturating_add(quantity),
            None => self.stacks.push(ItemStack { item, quantity }),
        }
        tracing::info!("adding item: {} (x{quantity})", item.name);
        Ok(())
    }

    /// Removes `quantity`, dropping the stack entirely when it would reach
    /// zero or below.
    pub fn remove_item(&mut self, id: u32, quantity: u32) -> Result<()> {
        let idx = self
            .stacks
            .iter()
            .position(|s| s.item.id == id)
            .ok_or(SandboxError::NotInInventory(id))?;
        if self.stacks[idx].quantity > quantity {
            self.stacks[idx].quantity -= quantity;
        } else {
            self.stacks.remove(idx);
        }
        tracing::info!("removing item: {id} (x{quantity})");
        Ok(())
    }

    pub fn has_item(&self, id: u32, quantity: u32) -> bool {
        self.stacks
            .iter()
            .any(|s| s.item.id == id && s.quantity >= quantity)
    }

    pub fn quantity_of(&self, id: u32) -> u32 {
        self.stacks
            .iter()
            .find(|s| s.item.id == id)
            .map_or(0, |s| s.quantity)
    }
}
