//! Plugins registered by [`PluginRegistry::with_builtins`].

mod common;
mod request;
mod response;

pub use common::{DelayPlugin, LoggerPlugin, RegisterPlugin};
pub use request::{AddHeaderPlugin, FileInputPlugin, JsonPostDataPlugin, RequestProfilerPlugin};
pub use response::{
    AssertHttpStatusCodePlugin, JsonFileOutputPlugin, ResponseAsJsonPlugin, ResponseProfilerPlugin,
    StdoutWriterPlugin,
};

use crate::context::Phase;
use crate::plugins::{ArgumentSpec, PluginDescriptor, PluginRegistry};

pub fn register_builtins(registry: &mut PluginRegistry) {
    let logger_args = |d: PluginDescriptor| {
        d.argument(ArgumentSpec::optional("message", "none"))
            .argument(ArgumentSpec::optional("logger_name", "logger.plugin"))
            .argument(ArgumentSpec::optional("handler", "none"))
            .argument(ArgumentSpec::optional("formatter", "none"))
    };

    // request
    registry.register(
        PluginDescriptor::new("request_delay", Phase::Request, "Pause execution for the specified delay interval.")
            .argument(ArgumentSpec::required("seconds")),
        DelayPlugin::from_args,
    );
    registry.register(
        logger_args(PluginDescriptor::new(
            "request_logger",
            Phase::Request,
            "Log a message, optionally to a file handler.",
        )),
        LoggerPlugin::from_args,
    );
    registry.register(
        PluginDescriptor::new("pre_register", Phase::Request, "Add variables to the context before the request.")
            .argument(ArgumentSpec::required("**updates")),
        RegisterPlugin::from_args,
    );
    registry.register(
        PluginDescriptor::new("file_input", Phase::Request, "Read a local file and store it as the plugin result.")
            .argument(ArgumentSpec::required("filename")),
        FileInputPlugin::from_args,
    );
    registry.register(
        PluginDescriptor::new("profiler", Phase::Request, "Start timing the HTTP request."),
        RequestProfilerPlugin::from_args,
    );
    registry.register(
        PluginDescriptor::new("json_post_data", Phase::Request, "JSON-serialize the request data (POST body)."),
        JsonPostDataPlugin::from_args,
    );
    registry.register(
        PluginDescriptor::new("add_header", Phase::Request, "Add a request header.")
            .argument(ArgumentSpec::required("header"))
            .argument(ArgumentSpec::required("value")),
        AddHeaderPlugin::from_args,
    );

    // response
    registry.register(
        PluginDescriptor::new("post_register", Phase::Response, "Add variables to the context after the response.")
            .argument(ArgumentSpec::required("**updates")),
        RegisterPlugin::from_args,
    );
    registry.register(
        PluginDescriptor::new("response_as_json", Phase::Response, "Parse the response body as JSON into response.json."),
        ResponseAsJsonPlugin::from_args,
    );
    registry.register(
        logger_args(PluginDescriptor::new(
            "response_logger",
            Phase::Response,
            "Log a message, optionally to a file handler.",
        )),
        LoggerPlugin::from_args,
    );
    registry.register(
        PluginDescriptor::new("json_file_output", Phase::Response, "Write response.json to a file.")
            .argument(ArgumentSpec::required("filename"))
            .argument(ArgumentSpec::optional("create_dirs", "true")),
        JsonFileOutputPlugin::from_args,
    );
    registry.register(
        PluginDescriptor::new("profiler", Phase::Response, "Measure the time since the request profiler started."),
        ResponseProfilerPlugin::from_args,
    );
    registry.register(
        PluginDescriptor::new("stdout_writer", Phase::Response, "Print response.json to stdout."),
        StdoutWriterPlugin::from_args,
    );
    registry.register(
        PluginDescriptor::new(
            "assert_http_status_code",
            Phase::Response,
            "Check the response status code and stop the run on mismatch when failfast.",
        )
        .argument(ArgumentSpec::optional("expect", "200"))
        .argument(ArgumentSpec::optional("failfast", "inherited")),
        AssertHttpStatusCodePlugin::from_args,
    );
}
