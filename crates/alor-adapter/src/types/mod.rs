/*
[INPUT]:  Alor OpenAPI wire schemas (REST bodies and stream frames)
[OUTPUT]: Enums, subscription/order requests, and typed market data
[POS]:    Data layer - types shared by the REST, auth and stream layers
[UPDATE]: When the wire schema changes or new request kinds are added
*/

pub mod enums;
pub mod models;
pub mod requests;
pub mod responses;

pub use enums::*;
pub use models::*;
pub use requests::*;
pub use responses::*;
