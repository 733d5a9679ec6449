use std::fmt;

/// Kind of GPU object a `Handle` refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    VertexArray,
    Shader,
    Program,
    UniformBuffer,
    Texture,
}

/// Opaque reference to a GPU object owned by a `GraphicsContext`.
///
/// Id 0 is never allocated; it marks the invalid handle of a given kind
/// (e.g. the result of a failed, non-fatal shader compile).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Handle {
    kind: ResourceKind,
    id: u32,
}

impl Handle {
    pub const fn invalid(kind: ResourceKind) -> Self {
        Self { kind, id: 0 }
    }

    pub fn kind(self) -> ResourceKind {
        self.kind
    }

    pub fn id(self) -> u32 {
        self.id
    }

    pub fn is_valid(self) -> bool {
        self.id != 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ResourceKind::VertexArray => "vertex-array",
            ResourceKind::Shader => "shader",
            ResourceKind::Program => "program",
            ResourceKind::UniformBuffer => "uniform-buffer",
            ResourceKind::Texture => "texture",
        };
        if self.is_valid() {
            write!(f, "{kind}#{}", self.id)
        } else {
            write!(f, "{kind}#invalid")
        }
    }
}

/// Hands out handle ids in creation order, starting at 1.
#[derive(Debug)]
pub(crate) struct HandleAllocator {
    next: u32,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl HandleAllocator {
    pub(crate) fn allocate(&mut self, kind: ResourceKind) -> Handle {
        let id = self.next;
        self.next += 1;
        Handle { kind, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_and_never_zero() {
        let mut alloc = HandleAllocator::default();
        let a = alloc.allocate(ResourceKind::Shader);
        let b = alloc.allocate(ResourceKind::Program);
        assert_eq!((a.id(), b.id()), (1, 2));
        assert!(a.is_valid() && b.is_valid());
        assert_eq!(b.kind(), ResourceKind::Program);
    }

    #[test]
    fn invalid_handle_displays_kind() {
        let h = Handle::invalid(ResourceKind::Shader);
        assert!(!h.is_valid());
        assert_eq!(h.to_string(), "shader#invalid");
    }
}
