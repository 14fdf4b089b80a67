use crate::window::PageRequest;

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    LoadSnapshot,
    LoadPage(PageRequest),
    LoadTypes,
    LoadGroups,
    LoadMembership { group_id: u32 },
    ClearCache,
}
