use crate::constants::markup::MESSAGE_ID_ATTR;
use crate::page::Element;

/// Derives the id a message is stored under.
///
/// `siblings` are the assistant candidates sharing the node's parent, in
/// document order, as recognised by the caller. Returning `None` means the
/// node cannot be identified right now and must be skipped without writing
/// anything.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, node: &Element, siblings: &[&Element]) -> Option<String>;
}

/// Backend id when rendered, otherwise `msg-{index}` among `siblings`.
///
/// The positional fallback is only stable while message order is; deleting
/// or reordering earlier messages shifts later ids. It also only sees one
/// parent: when each message sits in its own wrapper element, every one of
/// them is `msg-0` and they overwrite each other.
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionalIdentity;

impl IdentityResolver for PositionalIdentity {
    fn resolve(&self, node: &Element, siblings: &[&Element]) -> Option<String> {
        if let Some(id) = node.attr(MESSAGE_ID_ATTR).filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }

        siblings
            .iter()
            .position(|sibling| std::ptr::eq(*sibling, node))
            .map(|index| format!("msg-{}", index))
    }
}
