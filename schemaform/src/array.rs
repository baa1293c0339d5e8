//! Array mutation engine.
//!
//! Array fields come in four variants: ordinary lists, fixed tuples with
//! optional additional items, multi-selects and file lists. Every action
//! takes the current elements and returns a new array together with a flag
//! telling the caller whether to re-run validation; the input is never
//! modified. Preconditions are checked here as well as in the capability
//! flags handed to the renderer, so a mismatch between the two surfaces as an
//! [`FormError::InvalidArrayOperation`] instead of corrupted data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    defaults::get_default,
    error::{FormError, Result},
    path::DataPath,
    resolver::retrieve_schema,
    schema::{Definitions, SchemaNode},
    ui::{UiOptions, UiSchema},
};

const DATA_URL_FORMAT: &str = "data-url";

/// How an array field is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArrayVariant {
    /// Homogeneous list with per-item controls.
    Ordinary,
    /// `fixed_len` positional schemas, optionally followed by additional items.
    FixedTuple { fixed_len: usize, additional: bool },
    /// Selected values of an enum, replaced as a whole.
    MultiSelect,
    /// File references, replaced as a whole.
    FileList,
}

impl ArrayVariant {
    /// Variants without per-element editing.
    pub fn is_whole_value(self) -> bool {
        matches!(self, ArrayVariant::MultiSelect | ArrayVariant::FileList)
    }
}

/// A user action against one array field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ArrayAction {
    /// Add a defaulted element at the end.
    Append,
    /// Remove the element at `index`.
    RemoveAt { index: usize },
    /// Swap two elements.
    Reorder { from: usize, to: usize },
    /// Move `from` to `to`, shifting the elements in between.
    SortTo { from: usize, to: usize },
    /// Replace the whole array.
    SetWhole { value: Vec<Value> },
    /// Replace one element; a missing value is stored as `null`.
    SetItem {
        index: usize,
        #[serde(default)]
        value: Option<Value>,
    },
}

impl ArrayAction {
    pub fn name(&self) -> &'static str {
        match self {
            ArrayAction::Append => "append",
            ArrayAction::RemoveAt { .. } => "remove",
            ArrayAction::Reorder { .. } => "reorder",
            ArrayAction::SortTo { .. } => "sort",
            ArrayAction::SetWhole { .. } => "set-whole",
            ArrayAction::SetItem { .. } => "set-item",
        }
    }
}

/// Result of applying an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayChange {
    pub value: Vec<Value>,
    /// Whether existing errors must be recomputed.
    pub validate: bool,
}

/// Field-level capabilities shown by the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArrayCapabilities {
    pub can_add: bool,
    pub orderable: bool,
    pub removable: bool,
    pub draggable: bool,
}

/// Per-element toolbar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemControls {
    pub move_up: bool,
    pub move_down: bool,
    pub remove: bool,
}

impl ItemControls {
    pub fn has_toolbar(&self) -> bool {
        self.move_up || self.move_down || self.remove
    }
}

/// Pick the array variant of an effective array schema.
///
/// File lists win over tuples, tuples over multi-selects.
pub fn array_variant(
    schema: &SchemaNode,
    ui: &UiSchema,
    definitions: &Definitions,
) -> Result<ArrayVariant> {
    let items = schema
        .item_schema()
        .map(|item| retrieve_schema(item, definitions))
        .transpose()?;

    let data_url_items = items
        .as_ref()
        .is_some_and(|i| i.format.as_deref() == Some(DATA_URL_FORMAT));
    if ui.wants_files() || data_url_items {
        return Ok(ArrayVariant::FileList);
    }
    if let Some(tuple) = schema.tuple_items().filter(|t| !t.is_empty()) {
        return Ok(ArrayVariant::FixedTuple {
            fixed_len: tuple.len(),
            additional: schema.additional_items_schema().is_some(),
        });
    }
    let enum_items = items.as_ref().is_some_and(SchemaNode::is_enum_like);
    if enum_items && (schema.unique_items == Some(true) || ui.wants_multi_select()) {
        return Ok(ArrayVariant::MultiSelect);
    }
    Ok(ArrayVariant::Ordinary)
}

/// Actions and capabilities of one array field.
pub struct ArrayEngine<'a> {
    schema: &'a SchemaNode,
    options: &'a UiOptions,
    definitions: &'a Definitions,
    variant: ArrayVariant,
    path: DataPath,
}

impl<'a> ArrayEngine<'a> {
    /// Engine for the effective array `schema` with UI hints `ui`.
    pub fn new(
        schema: &'a SchemaNode,
        ui: &'a UiSchema,
        definitions: &'a Definitions,
    ) -> Result<Self> {
        Ok(Self {
            schema,
            options: &ui.options,
            definitions,
            variant: array_variant(schema, ui, definitions)?,
            path: DataPath::root(),
        })
    }

    /// Report errors against `path`.
    pub fn at(mut self, path: DataPath) -> Self {
        self.path = path;
        self
    }

    pub fn variant(&self) -> ArrayVariant {
        self.variant
    }

    /// Whether an element can be appended to an array of `len` elements.
    ///
    /// A fixed tuple shorter than its declared length counts as full length,
    /// since appending fills the missing positions first.
    pub fn can_add(&self, len: usize) -> bool {
        let len = len.max(self.fixed_len());
        let below_max = self.schema.max_items.is_none_or(|max| len < max);
        let variant_allows = match self.variant {
            ArrayVariant::Ordinary => true,
            ArrayVariant::FixedTuple { additional, .. } => additional,
            ArrayVariant::MultiSelect | ArrayVariant::FileList => false,
        };
        self.options.addable() && below_max && variant_allows
    }

    pub fn capabilities(&self, len: usize) -> ArrayCapabilities {
        let per_item = !self.variant.is_whole_value();
        ArrayCapabilities {
            can_add: self.can_add(len),
            orderable: per_item && self.options.orderable(),
            removable: per_item && self.options.removable(),
            draggable: self.variant == ArrayVariant::Ordinary && self.schema.drag == Some(true),
        }
    }

    /// Toolbar for element `index` of an array of length `len`.
    pub fn item_controls(&self, index: usize, len: usize) -> ItemControls {
        let (move_up, move_down, remove) = match self.variant {
            ArrayVariant::Ordinary => (
                index > 0,
                index + 1 < len,
                len > self.schema.min_items.unwrap_or(0),
            ),
            ArrayVariant::FixedTuple { fixed_len, .. } => {
                let additional = index >= fixed_len;
                (index > fixed_len, additional && index + 1 < len, additional)
            }
            ArrayVariant::MultiSelect | ArrayVariant::FileList => (false, false, false),
        };
        ItemControls {
            move_up: move_up && self.options.orderable(),
            move_down: move_down && self.options.orderable(),
            remove: remove && self.options.removable(),
        }
    }

    fn fixed_len(&self) -> usize {
        match self.variant {
            ArrayVariant::FixedTuple { fixed_len, .. } => fixed_len,
            _ => 0,
        }
    }

    /// `data` extended with defaulted tuple positions up to the fixed length.
    fn padded(&self, data: &[Value]) -> Result<Vec<Value>> {
        let mut value = data.to_vec();
        let tuple = self.schema.tuple_items().unwrap_or_default();
        for raw in tuple.iter().skip(data.len()) {
            let slot = retrieve_schema(raw, self.definitions)?;
            value.push(get_default(&slot, None, self.definitions)?);
        }
        Ok(value)
    }

    /// A freshly defaulted element for [`ArrayAction::Append`].
    pub fn new_item(&self) -> Result<Value> {
        let raw = match self.variant {
            ArrayVariant::FixedTuple { .. } => self.schema.additional_items_schema(),
            _ => self.schema.item_schema(),
        };
        match raw {
            Some(raw) => {
                let item = retrieve_schema(raw, self.definitions)?;
                get_default(&item, None, self.definitions)
            }
            None => Ok(Value::Null),
        }
    }

    /// Apply one action to `data`.
    pub fn apply(&self, data: &[Value], action: ArrayAction) -> Result<ArrayChange> {
        let name = action.name();
        let change = match action {
            ArrayAction::Append => {
                if !self.can_add(data.len()) {
                    return Err(self.invalid(
                        name,
                        format!("cannot add to {} items", data.len()),
                    ));
                }
                let mut value = self.padded(data)?;
                value.push(self.new_item()?);
                ArrayChange {
                    value,
                    validate: false,
                }
            }
            ArrayAction::RemoveAt { index } => {
                self.check_per_item(name, data, index)?;
                if let ArrayVariant::FixedTuple { fixed_len, .. } = self.variant
                    && index < fixed_len
                {
                    return Err(self.invalid(
                        name,
                        format!("position {index} is part of the fixed tuple"),
                    ));
                }
                if !self.options.removable() {
                    return Err(self.invalid(name, "removal is disabled"));
                }
                let mut value = data.to_vec();
                value.remove(index);
                ArrayChange {
                    value,
                    validate: true,
                }
            }
            ArrayAction::Reorder { from, to } => {
                self.check_per_item(name, data, from)?;
                self.check_per_item(name, data, to)?;
                if let ArrayVariant::FixedTuple { fixed_len, .. } = self.variant
                    && from.min(to) < fixed_len
                {
                    return Err(self.invalid(name, "fixed tuple positions cannot move"));
                }
                if !self.options.orderable() {
                    return Err(self.invalid(name, "ordering is disabled"));
                }
                let mut value = data.to_vec();
                value.swap(from, to);
                ArrayChange {
                    value,
                    validate: true,
                }
            }
            ArrayAction::SortTo { from, to } => {
                if self.variant != ArrayVariant::Ordinary || self.schema.drag != Some(true) {
                    return Err(self.invalid(name, "drag sorting is not enabled"));
                }
                self.check_bounds(name, data, from)?;
                self.check_bounds(name, data, to)?;
                let mut value = data.to_vec();
                let moved = value.remove(from);
                value.insert(to, moved);
                ArrayChange {
                    value,
                    validate: false,
                }
            }
            ArrayAction::SetWhole { value } => {
                if !self.variant.is_whole_value() {
                    return Err(
                        self.invalid(name, "only multi-select and file arrays are replaced whole")
                    );
                }
                ArrayChange {
                    value,
                    validate: false,
                }
            }
            ArrayAction::SetItem { index, value: item } => {
                self.check_per_item(name, data, index)?;
                let mut value = data.to_vec();
                value[index] = item.unwrap_or(Value::Null);
                ArrayChange {
                    value,
                    validate: false,
                }
            }
        };
        debug!("{}: {name} -> {} items", self.path, change.value.len());
        Ok(change)
    }

    /// Apply `actions` in order, each against the previous result.
    pub fn apply_all(
        &self,
        data: &[Value],
        actions: impl IntoIterator<Item = ArrayAction>,
    ) -> Result<ArrayChange> {
        let mut change = ArrayChange {
            value: data.to_vec(),
            validate: false,
        };
        for action in actions {
            let next = self.apply(&change.value, action)?;
            change = ArrayChange {
                value: next.value,
                validate: change.validate || next.validate,
            };
        }
        Ok(change)
    }

    fn check_per_item(&self, action: &'static str, data: &[Value], index: usize) -> Result<()> {
        if self.variant.is_whole_value() {
            return Err(self.invalid(action, "elements of this array are not edited one by one"));
        }
        self.check_bounds(action, data, index)
    }

    fn check_bounds(&self, action: &'static str, data: &[Value], index: usize) -> Result<()> {
        if index >= data.len() {
            return Err(self.invalid(
                action,
                format!("index {index} out of bounds (len {})", data.len()),
            ));
        }
        Ok(())
    }

    fn invalid(&self, action: &'static str, reason: impl Into<String>) -> FormError {
        FormError::invalid_array(action, &self.path, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(v: Value) -> SchemaNode {
        SchemaNode::from_value(&v).unwrap()
    }

    fn ui(v: Value) -> UiSchema {
        UiSchema::from_value(&v).unwrap()
    }

    fn list_schema() -> SchemaNode {
        node(json!({
            "type": "array",
            "maxItems": 3,
            "minItems": 1,
            "drag": true,
            "items": {
                "type": "object",
                "properties": {"name": {"type": "string", "default": "new"}}
            }
        }))
    }

    fn tuple_schema() -> SchemaNode {
        node(json!({
            "type": "array",
            "items": [{"type": "string"}, {"type": "number"}],
            "additionalItems": {"type": "boolean", "default": true}
        }))
    }

    #[test]
    fn test_variant_selection() {
        let defs = Definitions::new();
        let none = UiSchema::default();
        assert_eq!(array_variant(&list_schema(), &none, &defs).unwrap(), ArrayVariant::Ordinary);
        assert_eq!(
            array_variant(&tuple_schema(), &none, &defs).unwrap(),
            ArrayVariant::FixedTuple { fixed_len: 2, additional: true }
        );
        let enum_items = node(json!({
            "type": "array",
            "uniqueItems": true,
            "items": {"type": "string", "enum": ["a", "b"]}
        }));
        assert_eq!(array_variant(&enum_items, &none, &defs).unwrap(), ArrayVariant::MultiSelect);
        let checkboxes = node(json!({"type": "array", "items": {"enum": [1, 2]}}));
        assert_eq!(array_variant(&checkboxes, &none, &defs).unwrap(), ArrayVariant::Ordinary);
        assert_eq!(
            array_variant(&checkboxes, &ui(json!({"ui:widget": "checkboxes"})), &defs).unwrap(),
            ArrayVariant::MultiSelect
        );
        let files =
            node(json!({"type": "array", "items": {"type": "string", "format": "data-url"}}));
        assert_eq!(array_variant(&files, &none, &defs).unwrap(), ArrayVariant::FileList);
        assert_eq!(
            array_variant(&list_schema(), &ui(json!({"ui:widget": "files"})), &defs).unwrap(),
            ArrayVariant::FileList
        );
    }

    #[test]
    fn test_append_uses_item_defaults() {
        let schema = list_schema();
        let ui = UiSchema::default();
        let defs = Definitions::new();
        let engine = ArrayEngine::new(&schema, &ui, &defs).unwrap();
        let change = engine.apply(&[json!({"name": "a"})], ArrayAction::Append).unwrap();
        assert_eq!(change.value, [json!({"name": "a"}), json!({"name": "new"})]);
        assert!(!change.validate);
    }

    #[test]
    fn test_append_respects_max_items_and_addable() {
        let schema = list_schema();
        let defs = Definitions::new();
        let ui_default = UiSchema::default();
        let engine = ArrayEngine::new(&schema, &ui_default, &defs).unwrap();
        let full = [json!({}), json!({}), json!({})];
        assert!(!engine.capabilities(3).can_add);
        let err = engine.apply(&full, ArrayAction::Append).unwrap_err();
        assert!(matches!(err, FormError::InvalidArrayOperation { action: "append", .. }));

        let locked = ui(json!({"ui:options": {"addable": false}}));
        let engine = ArrayEngine::new(&schema, &locked, &defs).unwrap();
        assert!(engine.apply(&[], ArrayAction::Append).is_err());
    }

    #[test]
    fn test_remove_and_reorder() {
        let schema = list_schema();
        let ui = UiSchema::default();
        let defs = Definitions::new();
        let engine = ArrayEngine::new(&schema, &ui, &defs).unwrap();
        let data = [json!(1), json!(2), json!(3)];

        let removed = engine.apply(&data, ArrayAction::RemoveAt { index: 1 }).unwrap();
        assert_eq!(removed.value, [json!(1), json!(3)]);
        assert!(removed.validate);
        assert!(engine.apply(&data, ArrayAction::RemoveAt { index: 3 }).is_err());

        let swapped = engine.apply(&data, ArrayAction::Reorder { from: 0, to: 2 }).unwrap();
        assert_eq!(swapped.value, [json!(3), json!(2), json!(1)]);
        assert!(swapped.validate);
        assert!(engine.apply(&data, ArrayAction::Reorder { from: 0, to: 9 }).is_err());
    }

    #[test]
    fn test_sort_to_is_a_list_move() {
        let schema = list_schema();
        let ui = UiSchema::default();
        let defs = Definitions::new();
        let engine = ArrayEngine::new(&schema, &ui, &defs).unwrap();
        let data = [json!("a"), json!("b"), json!("c"), json!("d")];
        let moved = engine.apply(&data, ArrayAction::SortTo { from: 0, to: 2 }).unwrap();
        assert_eq!(moved.value, [json!("b"), json!("c"), json!("a"), json!("d")]);
        let back = engine.apply(&data, ArrayAction::SortTo { from: 3, to: 0 }).unwrap();
        assert_eq!(back.value, [json!("d"), json!("a"), json!("b"), json!("c")]);

        let no_drag = node(json!({"type": "array", "items": {"type": "string"}}));
        let engine = ArrayEngine::new(&no_drag, &ui, &defs).unwrap();
        assert!(engine.apply(&data, ArrayAction::SortTo { from: 0, to: 1 }).is_err());
    }

    #[test]
    fn test_ordinary_item_controls() {
        let schema = list_schema();
        let defs = Definitions::new();
        let plain = UiSchema::default();
        let engine = ArrayEngine::new(&schema, &plain, &defs).unwrap();
        let first = engine.item_controls(0, 2);
        assert!(!first.move_up && first.move_down && first.remove);
        let last = engine.item_controls(1, 2);
        assert!(last.move_up && !last.move_down);
        // minItems = 1
        assert!(!engine.item_controls(0, 1).remove);

        let frozen = ui(json!({"ui:options": {"orderable": false, "removable": false}}));
        let engine = ArrayEngine::new(&schema, &frozen, &defs).unwrap();
        assert!(!engine.item_controls(1, 3).has_toolbar());
        let pair = [json!(1), json!(2)];
        assert!(engine.apply(&pair, ArrayAction::Reorder { from: 0, to: 1 }).is_err());
        assert!(engine.apply(&pair, ArrayAction::RemoveAt { index: 0 }).is_err());
    }

    #[test]
    fn test_fixed_tuple_rules() {
        let schema = tuple_schema();
        let ui = UiSchema::default();
        let defs = Definitions::new();
        let engine = ArrayEngine::new(&schema, &ui, &defs).unwrap();
        let data = [json!("a"), json!(1), json!(false), json!(true)];

        assert!(engine.apply(&data, ArrayAction::RemoveAt { index: 0 }).is_err());
        assert!(engine.apply(&data, ArrayAction::RemoveAt { index: 1 }).is_err());
        assert_eq!(
            engine.apply(&data, ArrayAction::RemoveAt { index: 2 }).unwrap().value,
            [json!("a"), json!(1), json!(true)]
        );
        assert!(engine.apply(&data, ArrayAction::Reorder { from: 1, to: 2 }).is_err());
        assert_eq!(
            engine.apply(&data, ArrayAction::Reorder { from: 2, to: 3 }).unwrap().value,
            [json!("a"), json!(1), json!(true), json!(false)]
        );

        let appended = engine.apply(&data[..2], ArrayAction::Append).unwrap();
        assert_eq!(appended.value[2], json!(true));

        assert_eq!(engine.item_controls(1, 4), ItemControls::default());
        let third = engine.item_controls(2, 4);
        assert!(!third.move_up && third.move_down && third.remove);
        let fourth = engine.item_controls(3, 4);
        assert!(fourth.move_up && !fourth.move_down && fourth.remove);
    }

    #[test]
    fn test_append_to_short_tuple_fills_fixed_positions() {
        let schema = node(json!({
            "type": "array",
            "items": [{"type": "string", "default": "k"}, {"type": "number"}],
            "additionalItems": {"type": "boolean", "default": true}
        }));
        let ui = UiSchema::default();
        let defs = Definitions::new();
        let engine = ArrayEngine::new(&schema, &ui, &defs).unwrap();

        let change = engine.apply(&[], ArrayAction::Append).unwrap();
        assert_eq!(change.value, [json!("k"), json!(0), json!(true)]);
        let change = engine.apply(&[json!("a")], ArrayAction::Append).unwrap();
        assert_eq!(change.value, [json!("a"), json!(0), json!(true)]);

        let capped = node(json!({
            "type": "array",
            "maxItems": 2,
            "items": [{"type": "string"}, {"type": "number"}],
            "additionalItems": {"type": "boolean"}
        }));
        let engine = ArrayEngine::new(&capped, &ui, &defs).unwrap();
        assert!(!engine.can_add(0));
        assert!(engine.apply(&[], ArrayAction::Append).is_err());
    }

    #[test]
    fn test_tuple_without_additional_items_cannot_grow() {
        let schema = node(json!({"type": "array", "items": [{"type": "string"}]}));
        let ui = UiSchema::default();
        let defs = Definitions::new();
        let engine = ArrayEngine::new(&schema, &ui, &defs).unwrap();
        assert!(!engine.can_add(1));
        assert!(engine.apply(&[json!("x")], ArrayAction::Append).is_err());
    }

    #[test]
    fn test_whole_value_variants() {
        let schema =
            node(json!({"type": "array", "uniqueItems": true, "items": {"enum": ["x", "y"]}}));
        let ui = UiSchema::default();
        let defs = Definitions::new();
        let engine = ArrayEngine::new(&schema, &ui, &defs).unwrap();
        assert_eq!(engine.capabilities(0), ArrayCapabilities::default());
        let change = engine
            .apply(&[json!("x")], ArrayAction::SetWhole { value: vec![json!("x"), json!("y")] })
            .unwrap();
        assert_eq!(change.value, [json!("x"), json!("y")]);
        assert!(!change.validate);
        assert!(engine.apply(&[json!("x")], ArrayAction::RemoveAt { index: 0 }).is_err());
        assert!(engine.apply(&[], ArrayAction::Append).is_err());

        let list = list_schema();
        let engine = ArrayEngine::new(&list, &ui, &defs).unwrap();
        assert!(engine.apply(&[], ArrayAction::SetWhole { value: vec![] }).is_err());
    }

    #[test]
    fn test_set_item_and_sequential_actions() {
        let schema = list_schema();
        let ui = UiSchema::default();
        let defs = Definitions::new();
        let engine = ArrayEngine::new(&schema, &ui, &defs)
            .unwrap()
            .at(DataPath::parse("people"));
        let data = [json!("a"), json!("b"), json!("c")];

        let set = engine.apply(&data, ArrayAction::SetItem { index: 1, value: None }).unwrap();
        assert_eq!(set.value, [json!("a"), Value::Null, json!("c")]);

        // the second removal sees the array produced by the first
        let twice = [
            ArrayAction::RemoveAt { index: 0 },
            ArrayAction::RemoveAt { index: 1 },
        ];
        let change = engine.apply_all(&data, twice).unwrap();
        assert_eq!(change.value, [json!("b")]);
        assert!(change.validate);

        let past_end = [
            ArrayAction::RemoveAt { index: 2 },
            ArrayAction::RemoveAt { index: 2 },
        ];
        let err = engine.apply_all(&data, past_end).unwrap_err();
        assert!(err.to_string().contains("/people"));
    }

    #[test]
    fn test_action_wire_format() {
        let action: ArrayAction =
            serde_json::from_value(json!({"action": "reorder", "from": 0, "to": 1})).unwrap();
        assert_eq!(action, ArrayAction::Reorder { from: 0, to: 1 });
        let action: ArrayAction = serde_json::from_value(json!({"action": "append"})).unwrap();
        assert_eq!(action, ArrayAction::Append);
    }
}
