use crate::layout::LayoutError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedItem {
    pub key: String,
    pub value: f64,
}

impl WeightedItem {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    fn validate(&self) -> Result<(), LayoutError> {
        let ok = [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite())
            && self.w >= 0.0
            && self.h >= 0.0;
        if ok {
            Ok(())
        } else {
            Err(LayoutError::InvalidBounds {
                w: self.w,
                h: self.h,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedRect {
    pub key: String,
    #[serde(flatten)]
    pub rect: Rect,
}

/// Binary treemap: recursively halves `bounds` into two value-balanced groups, cutting
/// across the longer side, until each item owns one rectangle.
///
/// Items are ordered by value descending (ties keep input order) and dealt greedily to
/// whichever side has the smaller running sum, ties going left. A group whose values
/// sum to zero is split evenly by item count.
pub fn binary_treemap(items: &[WeightedItem], bounds: Rect) -> Result<Vec<KeyedRect>, LayoutError> {
    bounds.validate()?;

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !item.value.is_finite() || item.value < 0.0 {
            return Err(LayoutError::InvalidValue {
                key: item.key.clone(),
                value: item.value,
            });
        }
        if !seen.insert(item.key.as_str()) {
            return Err(LayoutError::DuplicateKey(item.key.clone()));
        }
    }

    let mut sorted: Vec<&WeightedItem> = items.iter().collect();
    // Stable: equal values keep input order.
    sorted.sort_by(|a, b| b.value.total_cmp(&a.value));

    let mut out = Vec::with_capacity(items.len());
    split(&sorted, bounds, &mut out);
    Ok(out)
}

// `items` is already sorted descending; any subsequence of it stays sorted.
fn split(items: &[&WeightedItem], r: Rect, out: &mut Vec<KeyedRect>) {
    match items {
        [] => return,
        [only] => {
            out.push(KeyedRect {
                key: only.key.clone(),
                rect: r,
            });
            return;
        }
        _ => {}
    }

    let total: f64 = items.iter().map(|i| i.value).sum();
    let (left, right) = if total > 0.0 {
        partition(items)
    } else {
        let mid = items.len().div_ceil(2);
        (items[..mid].to_vec(), items[mid..].to_vec())
    };

    let left_share = if total > 0.0 {
        left.iter().map(|i| i.value).sum::<f64>() / total
    } else {
        left.len() as f64 / items.len() as f64
    };

    let (lr, rr) = if r.w >= r.h {
        let wl = r.w * left_share;
        (
            Rect::new(r.x, r.y, wl, r.h),
            Rect::new(r.x + wl, r.y, r.w - wl, r.h),
        )
    } else {
        let hl = r.h * left_share;
        (
            Rect::new(r.x, r.y, r.w, hl),
            Rect::new(r.x, r.y + hl, r.w, r.h - hl),
        )
    };

    split(&left, lr, out);
    split(&right, rr, out);
}

/// Greedy two-way deal of descending items; ties on the running sums go left.
fn partition<'a>(items: &[&'a WeightedItem]) -> (Vec<&'a WeightedItem>, Vec<&'a WeightedItem>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let (mut sum_left, mut sum_right) = (0.0, 0.0);
    for item in items {
        if sum_left <= sum_right {
            left.push(*item);
            sum_left += item.value;
        } else {
            right.push(*item);
            sum_right += item.value;
        }
    }
    (left, right)
}
