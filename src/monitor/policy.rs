use crate::store::NOT_FOUND;

/// Whether a change from `before` to `current` deserves a notification.
///
/// The first observation of a target (`before == NOT_FOUND`) only seeds the
/// baseline. With `only_compare_class` set, codes within the same hundred
/// (e.g. 200 and 204) are treated as equal.
pub fn should_notify(before: i32, current: i32, only_compare_class: bool) -> bool {
    if before == NOT_FOUND {
        return false;
    }

    if only_compare_class {
        before / 100 != current / 100
    } else {
        before != current
    }
}
