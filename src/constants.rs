pub mod demo {

    pub const USERNAME: &str = "demo@dataplate.io";

    pub const PASSWORD: &str = "demo";

    pub const DISPLAY_NAME: &str = "Demo User";
}

pub mod roles {

    pub const ADMIN: &str = "admin";

    pub const REPORT_VIEWER: &str = "report-viewer";
}

pub mod session {

    pub const USER_KEY: &str = "user";

    pub const FLASH_KEY: &str = "_flashes";
}

pub mod audit {

    pub const LOGIN: &str = "login";

    pub const VIEW_REPORT: &str = "view_report";

    pub const RUN_QUERY: &str = "run_query";

    pub const REGENERATE_ACCESS_KEY: &str = "regenerate_access_key";
}

pub const GLOBAL_CONFIG_ID: i32 = 1;

pub const REPORT_EXTENSION: &str = ".html";
