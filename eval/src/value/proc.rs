use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use nodemarshal::{NodeId, Symbol};

use crate::scope::Env;

pub enum ProcBody {
    /// A block literal, closed over the scope it was created in.
    Block {
        params: NodeId,
        body: NodeId,
        env: Env,
        /// The block of the method the literal appears in, which is
        /// what `yield` inside it calls.
        outer: Option<Rc<Proc>>,
    },
    /// `&:name`, which calls `name` on its first argument.
    Method(Symbol),
}

/// A block or lambda. Procs are only meaningful while the graph they
/// were created from is being evaluated.
pub struct Proc {
    /// Unique within one evaluation, used to route `break`.
    pub id: usize,
    pub lambda: bool,
    pub body: ProcBody,
}

impl Debug for Proc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            ProcBody::Block { params, body, .. } => write!(
                f,
                "Proc {{ id: {}, lambda: {}, params: {params}, body: {body} }}",
                self.id, self.lambda
            ),
            ProcBody::Method(name) => write!(f, "Proc {{ id: {}, method: {name:?} }}", self.id),
        }
    }
}

impl Display for Proc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<Proc:0x{:016x}", self.id)?;
        if let ProcBody::Method(name) = &self.body {
            write!(f, "(&{name:?})")?;
        }
        if self.lambda {
            f.write_str(" (lambda)")?;
        }
        f.write_str(">")
    }
}
