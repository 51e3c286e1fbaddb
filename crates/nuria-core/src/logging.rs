//! Logging and debugging facilities for Nuria.
//!
//! This module provides:
//! - Target names for filtering the crate's `tracing` output per subsystem
//! - Debug visualization of the type hierarchy held by a [`MetaRegistry`]
//! - Performance tracing hooks for profiling
//!
//! # Tracing Integration
//!
//! Nuria uses the `tracing` crate for instrumentation. To see logs, install a
//! tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("nuria_core::serializer=debug,nuria_core=warn")
//!         .init();
//! }
//! ```
//!
//! # Debug Visualization
//!
//! Use [`MetaTreeDebug`] to print the registered types by inheritance:
//!
//! ```
//! use nuria_core::logging::MetaTreeDebug;
//! use nuria_core::meta::{MetaRegistry, RuntimeMetaObject};
//!
//! let registry = MetaRegistry::new();
//! let mut shape = RuntimeMetaObject::new("Shape");
//! shape.finalize();
//! registry.register(shape).unwrap();
//!
//! println!("{}", MetaTreeDebug::new(&registry));
//! ```

use std::collections::HashSet;
use std::fmt::{self, Write as FmtWrite};
use std::sync::Arc;

use crate::meta::{MetaObject, MetaRegistry};

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Variant conversion target.
    pub const VARIANT: &str = "nuria_core::variant";
    /// Reflection target.
    pub const META: &str = "nuria_core::meta";
    /// Callback target.
    pub const CALLBACK: &str = "nuria_core::callback";
    /// Condition evaluation target.
    pub const CONDITION: &str = "nuria_core::condition";
    /// Serializer target.
    pub const SERIALIZER: &str = "nuria_core::serializer";
    /// Event loop target.
    pub const EVENT_LOOP: &str = "nuria_core::event_loop";
    /// Target of [`PerfSpan`](super::PerfSpan)s.
    pub const PERF: &str = "nuria_core::perf";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line prefixes.
    Compact,
}

/// Configuration for [`MetaTreeDebug`] output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show method, field and enum counts.
    pub show_counts: bool,
    /// Whether to list class annotations below each type.
    pub show_annotations: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_counts: true,
            show_annotations: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Options for detailed output.
    pub fn detailed() -> Self {
        Self {
            show_annotations: true,
            ..Default::default()
        }
    }

    /// Options for names only.
    pub fn minimal() -> Self {
        Self {
            show_counts: false,
            show_annotations: false,
            ..Default::default()
        }
    }
}

/// Renders the inheritance forest of a [`MetaRegistry`].
///
/// Roots are the types none of whose base classes are registered. A type
/// with several registered bases appears under each of them.
#[derive(Debug, Clone)]
pub struct MetaTreeDebug<'r> {
    registry: &'r MetaRegistry,
    options: TreeFormatOptions,
}

impl<'r> MetaTreeDebug<'r> {
    /// A visualizer with default options.
    pub fn new(registry: &'r MetaRegistry) -> Self {
        Self::with_options(registry, TreeFormatOptions::default())
    }

    /// A visualizer with custom options.
    pub fn with_options(registry: &'r MetaRegistry, options: TreeFormatOptions) -> Self {
        Self { registry, options }
    }

    /// Format every registered type.
    pub fn format_all(&self) -> String {
        let all = self.registry.all();
        let roots: Vec<&Arc<dyn MetaObject>> = all
            .iter()
            .filter(|meta| meta.base_classes().iter().all(|base| !self.registry.contains(base)))
            .collect();

        let mut output = String::new();
        let _ = writeln!(output, "Type Tree ({} registered types):", all.len());
        if roots.is_empty() {
            let _ = writeln!(output, "  (empty)");
        }
        for root in roots {
            self.format_subtree_into(root.as_ref(), 0, true, &mut HashSet::new(), &mut output);
        }
        output
    }

    /// Format the subtree rooted at `class_name`, or `None` if it is not registered.
    pub fn format_subtree(&self, class_name: &str) -> Option<String> {
        let root = self.registry.by_name(class_name)?;
        let mut output = String::new();
        self.format_subtree_into(root.as_ref(), 0, true, &mut HashSet::new(), &mut output);
        Some(output)
    }

    fn format_subtree_into(
        &self,
        meta: &dyn MetaObject,
        depth: usize,
        is_last: bool,
        path: &mut HashSet<String>,
        output: &mut String,
    ) {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return;
        }

        output.push_str(&self.build_prefix(depth, is_last));
        output.push_str(meta.class_name());

        if self.options.show_counts {
            let _ = write!(
                output,
                " (methods: {}, fields: {}, enums: {})",
                meta.method_count(),
                meta.field_count(),
                meta.enum_count()
            );
        }
        output.push('\n');

        if self.options.show_annotations {
            let prefix = self.build_detail_prefix(depth);
            for i in 0..meta.annotation_count() {
                let annotation = meta.annotation(i);
                let value = annotation.value().to_string_value().unwrap_or_default();
                let _ = writeln!(output, "{prefix}  @{} = {value}", annotation.name());
            }
        }

        // Guards against base-class cycles.
        if !path.insert(meta.class_name().to_string()) {
            return;
        }
        let children = self.registry.types_inheriting(meta.class_name());
        let count = children.len();
        for (i, child) in children.values().enumerate() {
            if !path.contains(child.class_name()) {
                self.format_subtree_into(child.as_ref(), depth + 1, i + 1 == count, path, output);
            }
        }
        path.remove(meta.class_name());
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, corner, last) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', self.options.indent_size));
        }
        prefix.push_str(if is_last { last } else { corner });
        prefix.push(' ');
        prefix
    }

    fn build_detail_prefix(&self, depth: usize) -> String {
        let branch = match self.options.style {
            TreeStyle::Ascii => "|",
            TreeStyle::Unicode => "\u{2502}",
            TreeStyle::Compact => "",
        };

        let mut prefix = String::new();
        for _ in 0..depth {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', self.options.indent_size));
        }
        prefix
    }
}

impl fmt::Display for MetaTreeDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_all())
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::PERF, "perf", operation = name);
        Self { _span: span.entered() }
    }
}
