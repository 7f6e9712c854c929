pub mod client;
pub mod cmd;
pub mod config;
pub mod connection;
pub mod db;
pub mod frame;
pub mod funko;
pub mod logging;
pub mod server;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

pub const DEFAULT_PORT: u16 = 60300;

/*
    Request lifecycle:

    client                               server
      | -- connect -------------------------> |
      | <------------- {"type":"validConnection"}
      | -- {"type":"add","message":"..."} --> |  Db::open(user) -> apply
      | <-------- {"type":"add","message":"..."}
      |                                <close |

    One command per connection. Every frame is a JSON object followed by '\n'.
*/
