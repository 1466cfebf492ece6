//! The component tree, grounded in `tui.py`'s `Component`/`Focusable`
//! protocols and `Container` class.
//!
//! The reference passes plain object references around and tracks focus
//! and overlay identity with Python's `is` operator: `TUI` holds whatever
//! component reference `set_focus()` was called with, and later code asks
//! "is the currently-focused component this same object". Components are
//! shared, mutable, and compared by identity — exactly what
//! `Rc<RefCell<dyn Component>>` gives in Rust, so that's what this crate
//! uses instead of an owning tree; `Rc::ptr_eq` stands in for `is`.

use std::cell::RefCell;
use std::rc::Rc;

/// All components must implement this. Mirrors the `Component` protocol.
pub trait Component {
    /// Render to lines. Each line must be at most `width` visible columns.
    fn render(&mut self, width: u16) -> Vec<String>;

    /// Invalidate any cached rendering state.
    fn invalidate(&mut self) {}

    /// Handle keyboard input when this component has focus.
    fn handle_input(&mut self, _data: &str) {}

    /// Components that can receive hardware-cursor focus implement this.
    /// Mirrors `is_focusable()` checking `hasattr(component, "focused")`.
    fn as_focusable_mut(&mut self) -> Option<&mut dyn Focusable> {
        None
    }

    /// Does this component want Kitty-protocol key-release events
    /// forwarded to it, rather than only key presses?
    fn wants_key_release(&self) -> bool {
        false
    }
}

/// Components that can receive focus and display a hardware cursor. When
/// focused, a component emits [`crate::tui::CURSOR_MARKER`] in its
/// rendered output at the cursor position; the renderer finds, strips it,
/// and positions the hardware cursor there.
pub trait Focusable {
    fn is_focused(&self) -> bool;
    fn set_focused(&mut self, focused: bool);
}

pub type SharedComponent = Rc<RefCell<dyn Component>>;

pub fn shared<C: Component + 'static>(component: C) -> SharedComponent {
    Rc::new(RefCell::new(component))
}

/// A component that holds other components. Mirrors `Container` in
/// `tui.py`.
#[derive(Default, Clone)]
pub struct Container {
    children: Vec<SharedComponent>,
}

impl Container {
    pub fn new() -> Self {
        Self { children: Vec::new() }
    }

    pub fn add_child(&mut self, component: SharedComponent) {
        self.children.push(component);
    }

    pub fn remove_child(&mut self, component: &SharedComponent) {
        self.children.retain(|c| !Rc::ptr_eq(c, component));
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }

    pub fn children(&self) -> &[SharedComponent] {
        &self.children
    }
}

impl Component for Container {
    fn render(&mut self, width: u16) -> Vec<String> {
        let mut lines = Vec::new();
        for child in &self.children {
            lines.extend(child.borrow_mut().render(width));
        }
        lines
    }

    fn invalidate(&mut self) {
        for child in &self.children {
            child.borrow_mut().invalidate();
        }
    }

    fn handle_input(&mut self, _data: &str) {}
}

/// Does `component` implement [`Focusable`]? Mirrors `is_focusable()`.
pub fn is_focusable(component: &SharedComponent) -> bool {
    component.borrow_mut().as_focusable_mut().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(String);
    impl Component for Echo {
        fn render(&mut self, _width: u16) -> Vec<String> {
            vec![self.0.clone()]
        }
    }

    #[test]
    fn container_renders_children_in_order() {
        let mut c = Container::new();
        c.add_child(shared(Echo("a".into())));
        c.add_child(shared(Echo("b".into())));
        assert_eq!(c.render(80), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn remove_child_drops_it_from_render() {
        let mut c = Container::new();
        let a = shared(Echo("a".into()));
        c.add_child(a.clone());
        c.add_child(shared(Echo("b".into())));
        c.remove_child(&a);
        assert_eq!(c.render(80), vec!["b".to_string()]);
    }

    #[test]
    fn ptr_eq_distinguishes_clones_of_different_components() {
        let a = shared(Echo("a".into()));
        let b = shared(Echo("a".into()));
        assert!(!Rc::ptr_eq(&a, &b));
        assert!(Rc::ptr_eq(&a, &a.clone()));
    }
}
