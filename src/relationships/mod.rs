pub mod model;
pub mod projector;
pub mod repository;

pub use model::{
    EdgeKey, EdgeType, RelationshipEdge, RelationshipStatus, RelationshipView, SignIn, StatusChange, UserId,
    UserProfile,
};
pub use projector::project;
pub use repository::RelationshipRepository;
