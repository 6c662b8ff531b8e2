//! Template resolution: walks a parsed job tree and renders one `.part`
//! fragment per supported tag, concatenating the fragments into the final
//! YAML block for the job.
//!
//! Resolution runs in two passes, both rooted at an explicitly passed parts
//! directory:
//!
//! 1. A per-field walk from the root. Each child tag looks up
//!    `<path>/<tag>.part`. A mapping-shaped child without a template is a
//!    container: the walk recurses into it with the path extended. A scalar
//!    child without a template means the enclosing tag is not covered by the
//!    parts directory at all; that surfaces as a warning naming the root tag
//!    and the whole pass contributes nothing.
//! 2. A whole-subtree pass over the mapping-shaped direct children of the
//!    root, looking up `<tag>/base.part`. A missing template here is the
//!    normal "tag not implemented yet" case: warn and skip the subtree.

use std::path::Path;

use hashlink::LinkedHashMap;
use minijinja::value::Value;
use minijinja::{path_loader, Environment, ErrorKind};
use thiserror::Error;
use tracing::warn;

use crate::tree::{JobNode, JobTree};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Internal recursion signal: `<dir>/<tag>.part` does not exist and the
    /// tag cannot be descended into. Converted into a warning at the root,
    /// never returned from [`TemplateResolver::render_job`].
    #[error("no template `{dir}/{tag}.part`")]
    ContainerNotFound { tag: String, dir: String },
    #[error("expected nested settings at `{path}`, found a scalar value")]
    ShapeMismatch { path: String },
    #[error("template `{name}` failed to render")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Renders job trees against a directory of `.part` template fragments.
pub struct TemplateResolver {
    env: Environment<'static>,
}

impl TemplateResolver {
    /// Creates a resolver rooted at `parts_dir`. The directory mirrors the
    /// tag nesting of the source trees: `project/description.part`,
    /// `project/triggers/<tag>.part`, `scm/base.part`, and so on.
    pub fn new(parts_dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(parts_dir.as_ref()));
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        // Fragments are concatenated, so a part's final newline must survive.
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Converts one parsed job into its rendered text block.
    pub fn render_job(&self, tree: &JobTree) -> Result<String, ResolveError> {
        let mut out = String::new();

        match self.render_fields(&tree.root_tag, &tree.root, "") {
            Ok(fragment) => out.push_str(&fragment),
            Err(ResolveError::ContainerNotFound { tag, dir }) => {
                warn!(
                    tag = %tree.root_tag,
                    template = %format!("{dir}/{tag}.part"),
                    "template not found, XML tag not implemented yet"
                );
            }
            Err(e) => return Err(e),
        }

        if let JobNode::Map(children) = &tree.root {
            for (tag, child) in children {
                if !child.is_map() {
                    continue;
                }
                match self.render_subtree(tag, child)? {
                    Some(fragment) => out.push_str(&fragment),
                    None => {
                        warn!(
                            tag = %tag,
                            template = %format!("{tag}/base.part"),
                            "template not found, XML tag not implemented yet"
                        );
                    }
                }
            }
        }

        Ok(out)
    }

    /// Per-field pass. `dir` is the template path accumulated so far,
    /// relative to the parts root ("" at the top).
    fn render_fields(&self, name: &str, node: &JobNode, dir: &str) -> Result<String, ResolveError> {
        let JobNode::Map(children) = node else {
            return Err(ResolveError::ShapeMismatch {
                path: join(dir, name),
            });
        };
        let dir = join(dir, name);
        let mut out = String::new();

        for (tag, child) in children {
            let template = format!("{dir}/{tag}.part");
            match self.env.get_template(&template) {
                Ok(tpl) => {
                    let fragment = tpl.render(field_bindings(tag, child)).map_err(|e| {
                        ResolveError::Render {
                            name: template.clone(),
                            source: e,
                        }
                    })?;
                    out.push_str(&fragment);
                }
                Err(e) if e.kind() == ErrorKind::TemplateNotFound => match child {
                    JobNode::Map(_) => out.push_str(&self.render_fields(tag, child, &dir)?),
                    JobNode::Scalar(_) => {
                        return Err(ResolveError::ContainerNotFound {
                            tag: tag.clone(),
                            dir,
                        })
                    }
                },
                Err(e) => {
                    return Err(ResolveError::Render {
                        name: template,
                        source: e,
                    })
                }
            }
        }

        Ok(out)
    }

    /// Whole-subtree pass for one direct child of the root. `Ok(None)` means
    /// no `<tag>/base.part` exists.
    fn render_subtree(&self, tag: &str, node: &JobNode) -> Result<Option<String>, ResolveError> {
        let template = format!("{tag}/base.part");
        match self.env.get_template(&template) {
            Ok(tpl) => tpl
                .render(Value::from_serialize(node))
                .map(Some)
                .map_err(|e| ResolveError::Render {
                    name: template,
                    source: e,
                }),
            Err(e) if e.kind() == ErrorKind::TemplateNotFound => Ok(None),
            Err(e) => Err(ResolveError::Render {
                name: template,
                source: e,
            }),
        }
    }
}

/// Variable bindings for a per-field template: a mapping child binds its own
/// entries, a scalar child binds a single variable named after the tag.
fn field_bindings(tag: &str, node: &JobNode) -> Value {
    match node {
        JobNode::Map(_) => Value::from_serialize(node),
        JobNode::Scalar(value) => {
            let mut bindings = LinkedHashMap::new();
            bindings.insert(tag.to_string(), JobNode::Scalar(value.clone()));
            Value::from_serialize(&JobNode::Map(bindings))
        }
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_tree;
    use std::fs;
    use tempfile::TempDir;

    fn parts(entries: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().expect("temp parts dir");
        for (name, body) in entries {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        dir
    }

    #[test]
    fn renders_leaf_templates_in_document_order() {
        let parts = parts(&[
            ("project/description.part", "description: {{ description }}\n"),
            ("project/assignedNode.part", "node: {{ assignedNode }}\n"),
        ]);
        let tree = parse_tree(
            "<project><description>demo</description><assignedNode>linux</assignedNode></project>",
        )
        .unwrap();

        let out = TemplateResolver::new(parts.path()).render_job(&tree).unwrap();
        assert_eq!(out, "description: demo\nnode: linux\n");
    }

    #[test]
    fn container_tag_falls_through_to_children() {
        let parts = parts(&[(
            "project/triggers/hudson.triggers.TimerTrigger.part",
            "triggers:\n  - timed: '{{ spec }}'\n",
        )]);
        let tree = parse_tree(
            "<project><triggers><hudson.triggers.TimerTrigger><spec>H 2 * * *</spec>\
             </hudson.triggers.TimerTrigger></triggers></project>",
        )
        .unwrap();

        let out = TemplateResolver::new(parts.path()).render_job(&tree).unwrap();
        assert_eq!(out, "triggers:\n  - timed: 'H 2 * * *'\n");
    }

    #[test]
    fn missing_templates_skip_the_tree_without_failing() {
        let parts = parts(&[]);
        let tree = parse_tree("<project><description>hello</description></project>").unwrap();

        let out = TemplateResolver::new(parts.path()).render_job(&tree).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn uncovered_scalar_leaf_suppresses_the_field_pass() {
        let parts = parts(&[("project/description.part", "description: {{ description }}\n")]);
        let tree = parse_tree(
            "<project><description>demo</description><scm><url>x</url></scm></project>",
        )
        .unwrap();

        // scm has neither project/scm.part nor a template for its url leaf, so
        // the per-field pass cannot cover the root; only base.part lookups run,
        // and scm/base.part is absent too.
        let out = TemplateResolver::new(parts.path()).render_job(&tree).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn whole_subtree_template_renders_with_subtree_bindings() {
        let parts = parts(&[
            ("project/description.part", "description: {{ description }}\n"),
            ("project/scm.part", ""),
            ("scm/base.part", "scm:\n  - git:\n      url: {{ url }}\n"),
        ]);
        let tree = parse_tree(
            "<project><description>demo</description><scm><url>git://x</url></scm></project>",
        )
        .unwrap();

        let out = TemplateResolver::new(parts.path()).render_job(&tree).unwrap();
        assert_eq!(
            out,
            "description: demo\nscm:\n  - git:\n      url: git://x\n"
        );
    }

    #[test]
    fn scalar_root_is_a_shape_mismatch() {
        let parts = parts(&[]);
        let tree = parse_tree("<project>just text</project>").unwrap();

        let err = TemplateResolver::new(parts.path())
            .render_job(&tree)
            .unwrap_err();
        assert!(matches!(err, ResolveError::ShapeMismatch { .. }));
    }

    #[test]
    fn broken_template_syntax_is_a_render_error() {
        let parts = parts(&[("project/description.part", "{% if %}")]);
        let tree = parse_tree("<project><description>x</description></project>").unwrap();

        let err = TemplateResolver::new(parts.path())
            .render_job(&tree)
            .unwrap_err();
        assert!(matches!(err, ResolveError::Render { .. }));
    }

    #[test]
    fn rendering_is_deterministic() {
        let parts = parts(&[
            ("project/description.part", "description: {{ description }}\n"),
            ("project/keepDependencies.part", "keep: {{ keepDependencies }}\n"),
        ]);
        let tree = parse_tree(
            "<project><description>d</description><keepDependencies>false</keepDependencies></project>",
        )
        .unwrap();

        let resolver = TemplateResolver::new(parts.path());
        let first = resolver.render_job(&tree).unwrap();
        let second = resolver.render_job(&tree).unwrap();
        assert_eq!(first, second);
    }
}
