//! Digital-signature detection.
//!
//! Rewriting a signed PDF invalidates its signature, so the metadata writer
//! refuses any document this module reports as signed. The walk is over a
//! minimal node view of the object graph: AcroForm fields (following
//! `/Kids`) and widget annotations on the first pages.
//!
//! Detection fails closed: a document whose structure cannot be followed
//! (missing catalog, dangling reference) is reported as signed.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use tracing::debug;

/// Pages whose annotations are inspected.
const MAX_PAGES: usize = 50;

/// Reference chains longer than this are treated as malformed.
const MAX_HOPS: usize = 32;

/// Whether `doc` appears to carry a digital signature.
pub fn is_signed(doc: &Document) -> bool {
    Walker::new(doc).scan().unwrap_or_else(|e| {
        debug!("Signature scan failed, assuming signed: {}", e.0);
        true
    })
}

/// The structure could not be followed.
#[derive(Debug)]
struct Malformed(String);

/// What the walker needs to know about an object.
#[derive(Clone, Copy)]
enum Node<'a> {
    Dictionary(&'a Dictionary),
    Array(&'a [Object]),
    Reference(ObjectId),
    Scalar,
}

impl<'a> Node<'a> {
    fn of(obj: &'a Object) -> Self {
        match obj {
            Object::Dictionary(d) => Node::Dictionary(d),
            Object::Stream(s) => Node::Dictionary(&s.dict),
            Object::Array(a) => Node::Array(a.as_slice()),
            Object::Reference(id) => Node::Reference(*id),
            _ => Node::Scalar,
        }
    }
}

struct Walker<'a> {
    doc: &'a Document,
    visited: HashSet<ObjectId>,
}

impl<'a> Walker<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            visited: HashSet::new(),
        }
    }

    fn scan(&mut self) -> Result<bool, Malformed> {
        let doc = self.doc;
        let root = self.required(&doc.trailer, b"Root")?;
        let root = dict(root, "Root")?;

        if let Some(acro) = self.optional(root, b"AcroForm")? {
            let acro = dict(acro, "AcroForm")?;
            if let Some(Node::Array(fields)) = self.optional(acro, b"Fields")? {
                if self.fields_signed(fields)? {
                    return Ok(true);
                }
            }
        }

        for (_, page_id) in doc.get_pages().into_iter().take(MAX_PAGES) {
            let page = dict(self.resolve_id(page_id)?, "Page")?;
            let Some(Node::Array(annots)) = self.optional(page, b"Annots")? else {
                continue;
            };
            for annot in annots {
                let Node::Dictionary(a) = self.resolve(annot)? else {
                    continue;
                };
                if name_is(a, b"Subtype", b"Widget") && self.is_sig_field(a)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Depth-first walk over the field tree.
    fn fields_signed(&mut self, fields: &'a [Object]) -> Result<bool, Malformed> {
        let mut stack: Vec<&'a Object> = fields.iter().rev().collect();
        while let Some(obj) = stack.pop() {
            if let Object::Reference(id) = obj {
                if !self.visited.insert(*id) {
                    continue;
                }
            }
            let Node::Dictionary(field) = self.resolve(obj)? else {
                continue;
            };
            if self.is_sig_field(field)? {
                return Ok(true);
            }
            if let Some(Node::Array(kids)) = self.optional(field, b"Kids")? {
                stack.extend(kids.iter().rev());
            }
        }
        Ok(false)
    }

    fn is_sig_field(&self, d: &'a Dictionary) -> Result<bool, Malformed> {
        if name_is(d, b"FT", b"Sig") {
            return Ok(true);
        }
        Ok(matches!(
            self.optional(d, b"V")?,
            Some(Node::Dictionary(v)) if name_is(v, b"Type", b"Sig")
        ))
    }

    /// Follow references until a non-reference node.
    fn resolve(&self, obj: &'a Object) -> Result<Node<'a>, Malformed> {
        let mut node = Node::of(obj);
        for _ in 0..MAX_HOPS {
            match node {
                Node::Reference(id) => node = Node::of(self.object(id)?),
                resolved => return Ok(resolved),
            }
        }
        Err(Malformed("reference chain too long".into()))
    }

    fn resolve_id(&self, id: ObjectId) -> Result<Node<'a>, Malformed> {
        self.resolve(self.object(id)?)
    }

    fn object(&self, id: ObjectId) -> Result<&'a Object, Malformed> {
        self.doc
            .get_object(id)
            .map_err(|_| Malformed(format!("dangling reference {} {} R", id.0, id.1)))
    }

    fn optional(&self, d: &'a Dictionary, key: &[u8]) -> Result<Option<Node<'a>>, Malformed> {
        match d.get(key) {
            Ok(obj) => self.resolve(obj).map(Some),
            Err(_) => Ok(None),
        }
    }

    fn required(&self, d: &'a Dictionary, key: &[u8]) -> Result<Node<'a>, Malformed> {
        self.optional(d, key)?
            .ok_or_else(|| Malformed(format!("missing /{}", String::from_utf8_lossy(key))))
    }
}

fn dict<'a>(node: Node<'a>, what: &str) -> Result<&'a Dictionary, Malformed> {
    match node {
        Node::Dictionary(d) => Ok(d),
        _ => Err(Malformed(format!("/{what} is not a dictionary"))),
    }
}

fn name_is(d: &Dictionary, key: &[u8], expected: &[u8]) -> bool {
    matches!(d.get(key), Ok(Object::Name(n)) if n.as_slice() == expected)
}
