pub(crate) const SITE_CONFIG_GLOBAL: &str = "__IDONTGETAI_CONFIG__";
pub(crate) const VIEW_EVENT: &str = "idontgetai:view";
pub(crate) const COMMENTS_EVENT: &str = "idontgetai:comments";
pub(crate) const ROUTE_DATA_ATTRIBUTE: &str = "data-idontgetai-route";
pub(crate) const PDF_MIME_TYPE: &str = "application/pdf";
