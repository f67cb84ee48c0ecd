use serde::Serialize;

/// A discussion rooted at its opening post.
#[derive(Serialize)]
pub struct Thread {
    pub root: Post,
}

#[derive(Serialize)]
pub struct Post {
    pub thread: Option<Box<Thread>>,
    pub reply: Option<Box<Reply>>,
}

/// Same shape as `Thread`, but reached from `Post` while `Thread` is still open.
#[derive(Serialize)]
pub struct Reply {
    pub root: Post,
}
