quick_error! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Client operation error
    pub enum Error {
        /// An argument failed validation
        InvalidArg {
            description("invalid argument")
        }
        /// Anything without a more specific kind, including response
        /// streams that failed to parse
        Other {
            description("http client error")
        }
        /// The connection could not be established
        OpenFailed {
            description("failed to open the connection")
        }
        /// A request could not be written to the transport
        SendFailed {
            description("failed to send request")
        }
        /// The client was already set up
        AlreadyInit {
            description("client is already initialized")
        }
        /// A header block could not be built
        HeadersFailed {
            description("failed to construct headers")
        }
        /// The operation is not valid in the current connection state
        InvalidState {
            description("operation invalid in the current state")
        }
        /// The peer dropped the connection
        Disconnection {
            description("server disconnected")
        }
        /// The transport ran out of memory or buffers
        Memory {
            description("out of memory")
        }
    }
}
