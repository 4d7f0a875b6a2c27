//! Stack-based attribute tree builder.
//!
//! Leaf writes fill the current slot: the pending property of the innermost
//! object, the next element of the innermost array, or the root. Closing a
//! container compacts it. Null and empty children are dropped, except in the
//! outermost object when the matching persistence flag is set. Closing an
//! array marked as a set turns it into `SS`/`NS`/`BS` when every element
//! belongs to one scalar family, with members sorted.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;
use dynamap_model::AttributeValue;

use super::CodecContext;
use crate::error::{MapperError, MapperResult};

/// Persistence flags that only apply to the outermost value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteFlags {
    /// Keep `NULL` members of the outermost object (and a `NULL` root).
    pub persist_null_values: bool,
    /// Keep empty list/map members of the outermost object (and an empty root).
    pub persist_empty_objects: bool,
}

impl WriteFlags {
    /// Keeps everything at the outermost level.
    #[must_use]
    pub fn persist_all() -> Self {
        Self {
            persist_null_values: true,
            persist_empty_objects: true,
        }
    }
}

#[derive(Debug)]
enum Frame {
    Object {
        entries: BTreeMap<String, AttributeValue>,
        pinned: HashSet<String>,
        pending: Option<(String, bool)>,
        outermost: bool,
    },
    Array {
        elements: Vec<AttributeValue>,
        as_set: bool,
        nested_in_array: bool,
    },
}

/// Builds one [`AttributeValue`] from a sequence of writes.
#[derive(Debug)]
pub struct AttributeWriter<'a> {
    ctx: &'a CodecContext,
    flags: WriteFlags,
    nested: bool,
    stack: Vec<Frame>,
    root: Option<AttributeValue>,
    root_written: bool,
}

impl<'a> AttributeWriter<'a> {
    /// Writer for a top-level value.
    #[must_use]
    pub fn new(ctx: &'a CodecContext, flags: WriteFlags) -> Self {
        Self {
            ctx,
            flags,
            nested: false,
            stack: Vec::new(),
            root: None,
            root_written: false,
        }
    }

    /// Writer for a value that will be spliced into another tree.
    ///
    /// Nothing inside it counts as outermost, but its own root is returned
    /// as written (a `NULL` or empty root is not dropped).
    #[must_use]
    pub fn nested(ctx: &'a CodecContext) -> Self {
        Self {
            ctx,
            flags: WriteFlags::persist_all(),
            nested: true,
            stack: Vec::new(),
            root: None,
            root_written: false,
        }
    }

    /// Codec context the writer was created with.
    #[must_use]
    pub fn context(&self) -> &'a CodecContext {
        self.ctx
    }

    /// Opens an object in the current slot.
    pub fn begin_object(&mut self) -> MapperResult<()> {
        self.ensure_slot()?;
        let outermost = self.stack.is_empty() && !self.nested;
        self.stack.push(Frame::Object {
            entries: BTreeMap::new(),
            pinned: HashSet::new(),
            pending: None,
            outermost,
        });
        Ok(())
    }

    /// Names the slot the next write fills.
    pub fn property(&mut self, name: &str) -> MapperResult<()> {
        self.property_with(name, false)
    }

    /// Names the next slot; a pinned slot survives compaction of the
    /// outermost object even when null or empty.
    pub fn property_with(&mut self, name: &str, pinned: bool) -> MapperResult<()> {
        match self.stack.last_mut() {
            Some(Frame::Object { pending, .. }) => {
                if let Some((previous, _)) = pending.as_ref() {
                    return Err(MapperError::writer(format!(
                        "property '{previous}' was never written"
                    )));
                }
                *pending = Some((name.to_owned(), pinned));
                Ok(())
            }
            _ => Err(MapperError::writer(format!(
                "property '{name}' written outside an object"
            ))),
        }
    }

    /// Closes the innermost object.
    pub fn end_object(&mut self) -> MapperResult<()> {
        let Some(Frame::Object {
            mut entries,
            pinned,
            pending,
            outermost,
        }) = self.stack.pop()
        else {
            return Err(MapperError::writer("end_object without matching begin_object"));
        };
        if let Some((name, _)) = pending {
            return Err(MapperError::writer(format!("property '{name}' was never written")));
        }
        let flags = self.flags;
        entries.retain(|name, value| {
            if outermost && pinned.contains(name) {
                return true;
            }
            if value.is_null() {
                outermost && flags.persist_null_values
            } else if value.is_empty_container() {
                outermost && flags.persist_empty_objects
            } else {
                true
            }
        });
        self.place(AttributeValue::M(entries))
    }

    /// Opens an array in the current slot; `as_set` requests set inference.
    pub fn begin_array(&mut self, as_set: bool) -> MapperResult<()> {
        self.ensure_slot()?;
        let nested_in_array = matches!(self.stack.last(), Some(Frame::Array { .. }));
        self.stack.push(Frame::Array {
            elements: Vec::new(),
            as_set,
            nested_in_array,
        });
        Ok(())
    }

    /// Closes the innermost array.
    pub fn end_array(&mut self) -> MapperResult<()> {
        let Some(Frame::Array {
            mut elements,
            as_set,
            nested_in_array,
        }) = self.stack.pop()
        else {
            return Err(MapperError::writer("end_array without matching begin_array"));
        };
        let infer = as_set && !nested_in_array;
        if infer && elements.iter().any(AttributeValue::is_null) {
            return Err(MapperError::InvalidSetContents {
                message: "cannot persist null in set".to_owned(),
            });
        }
        elements.retain(|v| !v.is_null() && !v.is_empty_container());
        let value = if infer {
            infer_set(elements)?
        } else {
            AttributeValue::L(elements)
        };
        self.place(value)
    }

    /// Writes `NULL` into the current slot.
    pub fn write_null(&mut self) -> MapperResult<()> {
        self.place(AttributeValue::null())
    }

    /// Writes a string; an empty string is written as null.
    pub fn write_string(&mut self, value: &str) -> MapperResult<()> {
        if value.is_empty() {
            return self.write_null();
        }
        self.place(AttributeValue::S(value.to_owned()))
    }

    /// Writes already-canonical decimal text.
    pub fn write_number_text(&mut self, text: String) -> MapperResult<()> {
        self.place(AttributeValue::N(text))
    }

    /// Writes a signed integer.
    pub fn write_i64(&mut self, value: i64) -> MapperResult<()> {
        self.write_number_text(value.to_string())
    }

    /// Writes an unsigned integer.
    pub fn write_u64(&mut self, value: u64) -> MapperResult<()> {
        self.write_number_text(value.to_string())
    }

    /// Writes a float; NaN and infinities have no decimal form.
    pub fn write_f64(&mut self, value: f64) -> MapperResult<()> {
        if !value.is_finite() {
            return Err(MapperError::InvalidNumber {
                text: value.to_string(),
                target: "N".to_owned(),
            });
        }
        self.write_number_text(value.to_string())
    }

    /// Writes a boolean.
    pub fn write_bool(&mut self, value: bool) -> MapperResult<()> {
        self.place(AttributeValue::Bool(value))
    }

    /// Writes binary; an empty byte sequence is written as null.
    pub fn write_binary(&mut self, value: &Bytes) -> MapperResult<()> {
        if value.is_empty() {
            return self.write_null();
        }
        self.place(AttributeValue::B(value.clone()))
    }

    /// Writes a prebuilt value as-is.
    pub fn write_raw(&mut self, value: AttributeValue) -> MapperResult<()> {
        self.place(value)
    }

    /// Writes a leaf value through the converter registry.
    pub fn write_scalar<T: std::any::Any>(&mut self, value: &T) -> MapperResult<()> {
        let ctx = self.ctx;
        ctx.registry().write(value, self)
    }

    /// Finishes writing and returns the root, or `None` when it compacted away.
    pub fn finish(self) -> MapperResult<Option<AttributeValue>> {
        if !self.stack.is_empty() {
            return Err(MapperError::writer(format!(
                "{} container(s) left open",
                self.stack.len()
            )));
        }
        Ok(self.root.filter(|root| {
            if root.is_null() {
                self.flags.persist_null_values
            } else if root.is_empty_container() {
                self.flags.persist_empty_objects
            } else {
                true
            }
        }))
    }

    fn ensure_slot(&self) -> MapperResult<()> {
        match self.stack.last() {
            None if self.root_written => Err(MapperError::writer("root value already written")),
            Some(Frame::Object { pending: None, .. }) => {
                Err(MapperError::writer("value written without a property name"))
            }
            _ => Ok(()),
        }
    }

    fn place(&mut self, value: AttributeValue) -> MapperResult<()> {
        self.ensure_slot()?;
        match self.stack.last_mut() {
            None => {
                self.root = Some(value);
                self.root_written = true;
            }
            Some(Frame::Object {
                entries,
                pinned,
                pending,
                ..
            }) => {
                if let Some((name, pin)) = pending.take() {
                    if pin {
                        pinned.insert(name.clone());
                    }
                    entries.insert(name, value);
                }
            }
            Some(Frame::Array { elements, .. }) => elements.push(value),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    String,
    Number,
    Binary,
    Other,
}

fn family(value: &AttributeValue) -> Family {
    match value {
        AttributeValue::S(_) => Family::String,
        AttributeValue::N(_) => Family::Number,
        AttributeValue::B(_) => Family::Binary,
        _ => Family::Other,
    }
}

fn infer_set(elements: Vec<AttributeValue>) -> MapperResult<AttributeValue> {
    let Some(first) = elements.first().map(family) else {
        return Ok(AttributeValue::L(elements));
    };
    // Every element is checked, not only the first one seen.
    if elements.iter().any(|e| family(e) != first) {
        return Err(MapperError::InvalidSetContents {
            message: "cannot persist mixed-type set".to_owned(),
        });
    }
    let value = match first {
        Family::String => {
            let mut items = dedup(elements.into_iter().filter_map(|e| match e {
                AttributeValue::S(s) => Some(s),
                _ => None,
            }));
            items.sort_unstable();
            AttributeValue::Ss(items)
        }
        Family::Number => {
            let mut items = dedup(elements.into_iter().filter_map(|e| match e {
                AttributeValue::N(n) => Some(n),
                _ => None,
            }));
            items.sort_unstable_by(|a, b| compare_numbers(a, b));
            AttributeValue::Ns(items)
        }
        Family::Binary => {
            let mut items = dedup(elements.into_iter().filter_map(|e| match e {
                AttributeValue::B(b) => Some(b),
                _ => None,
            }));
            items.sort_unstable();
            AttributeValue::Bs(items)
        }
        Family::Other => AttributeValue::L(elements),
    };
    Ok(value)
}

fn dedup<T: Eq + std::hash::Hash + Clone>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}

/// Numeric order over number text, falling back to text order on ties or NaN.
fn compare_numbers(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| s.trim().parse::<f64>().unwrap_or(f64::NAN);
    parse(a)
        .partial_cmp(&parse(b))
        .filter(|o| o.is_ne())
        .unwrap_or_else(|| a.cmp(b))
}
