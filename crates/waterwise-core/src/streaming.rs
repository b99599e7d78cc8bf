use crate::constants::markup::{
    STOP_BUTTON_TEST_ID, STREAMING_CLASS, STREAMING_CLASS_FRAGMENT, TEST_ID_ATTR,
};
use crate::page::{Element, Page, Selector};

/// Whether `node` is still being generated and must not be persisted yet.
///
/// True when the page shows its stop control and the node carries the
/// streaming class, or when any descendant is flagged as streaming.
pub fn is_streaming(page: &Page, node: &Element) -> bool {
    let stop_control = Selector::tag_attr("button", TEST_ID_ATTR, STOP_BUTTON_TEST_ID);
    if node.has_class(STREAMING_CLASS) && page.contains(&stop_control) {
        return true;
    }
    node.contains(&Selector::class_contains(STREAMING_CLASS_FRAGMENT))
}
