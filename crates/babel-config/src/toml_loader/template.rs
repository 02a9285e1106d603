//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> &'static str {
    r##"# babel configuration
# Only override what you want to change -- missing fields use defaults.

[service]
# host = "dev.microsofttranslator.com"
# rest_endpoint = "https://dev.microsofttranslator.com/capito/room"
# websocket_endpoint = "wss://dev.microsofttranslator.com/capito/translate"
# region = "westus"           # required to create a room
# subscription_key = ""       # set this or auth_token, not both
# auth_token = ""
# client_app_id = ""

[participant]
# nickname = ""
# language = "en-US"
# translate_to = ["fr", "de"]
# tts_voice = ""
# tts_format = "wav"          # wav | wav-siren
# end_on_leave = false

[timeouts]
# connect_secs = 90           # 1-600
# leave_secs = 10             # 1-120
# http_connect_secs = 10      # 1-120
# http_request_secs = 30      # 1-600
# ping_interval_secs = 30     # 0-300, 0 disables

[logging]
# level = "INFO"              # DEBUG | INFO | WARNING | ERROR
"##
}
